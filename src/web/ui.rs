use axum::response::{Html, IntoResponse};

const INDEX_HTML: &str = include_str!("../../templates/index.html");

/// 首页处理器
pub async fn index_handler() -> impl IntoResponse {
    Html(INDEX_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_wires_up_the_prediction_api() {
        assert!(INDEX_HTML.contains("/api/predict"));
        assert!(INDEX_HTML.contains("/api/info"));
        for mode in ["mobilenet", "rescaling", "raw"] {
            assert!(INDEX_HTML.contains(&format!("value=\"{}\"", mode)), "{mode}");
        }
    }
}
