//! Normalización de texto compartida por la ingesta y las consultas.
//!
//! El alfabeto de entrada es fijo (portugués), así que basta con una tabla
//! de sustitución de acentos en lugar de un plegado Unicode completo.

/// Tabla fija de acentuadas (ya en mayúsculas) a su equivalente ASCII.
const ACCENT_TABLE: &[(char, char)] = &[
    ('Á', 'A'),
    ('À', 'A'),
    ('Â', 'A'),
    ('Ã', 'A'),
    ('Ä', 'A'),
    ('É', 'E'),
    ('È', 'E'),
    ('Ê', 'E'),
    ('Ë', 'E'),
    ('Í', 'I'),
    ('Ì', 'I'),
    ('Î', 'I'),
    ('Ï', 'I'),
    ('Ó', 'O'),
    ('Ò', 'O'),
    ('Ô', 'O'),
    ('Õ', 'O'),
    ('Ö', 'O'),
    ('Ú', 'U'),
    ('Ù', 'U'),
    ('Û', 'U'),
    ('Ü', 'U'),
    ('Ç', 'C'),
    ('Ñ', 'N'),
];

fn fold_char(c: char) -> char {
    ACCENT_TABLE
        .iter()
        .find(|(accented, _)| *accented == c)
        .map(|(_, plain)| *plain)
        .unwrap_or(c)
}

/// Clave canónica: mayúsculas, sin acentos de la tabla, espacios colapsados
/// y recortada. Función pura y total.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars().flat_map(char::to_uppercase) {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(fold_char(c));
    }

    out
}

/// Igual que [`normalize`], pero además sustituye por espacios todo lo que
/// no sea alfanumérico o apóstrofo. Sirve para comparar nombres del registro
/// por palabras completas dentro de texto libre.
pub fn match_key(text: &str) -> String {
    let normalized = normalize(text);
    let spaced: String = normalized
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect();
    normalize(&spaced)
}

/// `true` si `needle` aparece en `haystack` como secuencia de palabras
/// completas. Ambos deben venir de [`match_key`].
pub fn contains_words(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let padded_haystack = format!(" {haystack} ");
    let padded_needle = format!(" {needle} ");
    padded_haystack.contains(&padded_needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uppercases_and_folds_accents() {
        assert_eq!(normalize("Petrópolis"), "PETROPOLIS");
        assert_eq!(normalize("São João"), "SAO JOAO");
        assert_eq!(normalize("Certificação ambiental"), "CERTIFICACAO AMBIENTAL");
    }

    #[test]
    fn collapses_and_trims_whitespace() {
        assert_eq!(normalize("  boa \t vista\n do   sul  "), "BOA VISTA DO SUL");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn keeps_symbols_outside_the_table() {
        assert_eq!(normalize("Art. 1º"), "ART. 1º");
        assert_eq!(normalize("§ 2º"), "§ 2º");
    }

    #[test]
    fn match_key_strips_punctuation_but_keeps_apostrophes() {
        assert_eq!(match_key("altura em petrópolis?"), "ALTURA EM PETROPOLIS");
        assert_eq!(match_key("Passo d'Areia, ZOT-07"), "PASSO D'AREIA ZOT 07");
    }

    #[test]
    fn contains_words_respects_word_boundaries() {
        assert!(contains_words("ALTURA EM BOA VISTA DO SUL", "BOA VISTA"));
        assert!(contains_words("CRISTAL", "CRISTAL"));
        assert!(!contains_words("CRISTALINO", "CRISTAL"));
        assert!(!contains_words("QUALQUER", ""));
    }
}
