//! AI landing URLs.

use ::url::{ParseError, Url};

use sheetstream_config::UrlConfig;
use sheetstream_protocols::AiType;

/// Landing URL for `ai`, with `model` appended as a query parameter.
pub fn url_for(urls: &UrlConfig, ai: AiType, model: Option<&str>) -> Result<String, ParseError> {
    let mut url = Url::parse(urls.base_for(ai.key()).unwrap_or_default())?;
    if let Some(model) = model.map(str::trim).filter(|m| !m.is_empty()) {
        url.query_pairs_mut().append_pair("model", model);
    }
    Ok(url.into())
}
