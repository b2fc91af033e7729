// [libs/core/trainer/src/preprocess.rs]
/*!
 * =================================================================
 * APARATO: CANONICAL TEXT NORMALIZER (V4.0)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L2)
 * RESPONSABILIDAD: NORMALIZACIÓN CANÓNICA DEL TEXTO DE ENTRENAMIENTO
 *
 * VISION:
 * Normalización congelada por versión de modelo: minúsculas,
 * tokenización alfanumérica, descarte de stopwords (inglés) y
 * lematización ligera de sustantivos. El léxico viaja compilado en la
 * crate; no existen recursos externos que sincronizar.
 * =================================================================
 */

/// Léxico de stopwords (inglés). Congelado: cambiarlo invalida la
/// comparabilidad entre versiones de modelo.
const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "ain", "all", "am", "an", "and", "any",
    "are", "aren", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "couldn", "d", "did", "didn", "do", "does", "doesn", "doing",
    "don", "down", "during", "each", "few", "for", "from", "further", "had", "hadn", "has",
    "hasn", "have", "haven", "having", "he", "her", "here", "hers", "herself", "him", "himself",
    "his", "how", "i", "if", "in", "into", "is", "isn", "it", "its", "itself", "just", "ll",
    "m", "ma", "me", "mightn", "more", "most", "mustn", "my", "myself", "needn", "no", "nor",
    "not", "now", "o", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
    "ourselves", "out", "over", "own", "re", "s", "same", "shan", "she", "should", "shouldn",
    "so", "some", "such", "t", "than", "that", "the", "their", "theirs", "them", "themselves",
    "then", "there", "these", "they", "this", "those", "through", "to", "too", "under", "until",
    "up", "ve", "very", "was", "wasn", "we", "were", "weren", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "won", "wouldn", "y", "you", "your", "yours",
    "yourself", "yourselves",
];

fn is_stopword(token: &str) -> bool {
    ENGLISH_STOPWORDS.binary_search(&token).is_ok()
}

/// Lematización ligera estilo sustantivo: plurales regulares.
fn lemmatize_token(token: &str) -> String {
    let length = token.len();

    if length > 4 && token.ends_with("ies") {
        return format!("{}y", &token[..length - 3]);
    }
    if length > 4 && token.ends_with("sses") {
        return token[..length - 2].to_string();
    }
    if length > 3
        && (token.ends_with("xes") || token.ends_with("ches") || token.ends_with("shes"))
    {
        return token[..length - 2].to_string();
    }
    if length > 3 && token.ends_with('s') && !token.ends_with("ss") && !token.ends_with("us") {
        return token[..length - 1].to_string();
    }

    token.to_string()
}

/// Normalización canónica: minúsculas, tokens alfanuméricos, sin
/// stopwords, lematizados. Es la ÚNICA ruta de texto hacia el
/// vectorizador; congelada por versión de modelo.
pub fn canonical_normalize(raw_text: &str) -> Vec<String> {
    raw_text
        .to_lowercase()
        .split(|character: char| !character.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .filter(|token| !is_stopword(token))
        .map(lemmatize_token)
        .collect()
}
