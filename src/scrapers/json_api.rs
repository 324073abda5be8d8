//! Page lists served by a JSON endpoint.
//!
//! Typical of ASP.NET e-paper backends: a `POST` to a web-service method
//! returns `{"d": [{"PDF_DOCUMENT": "p1.pdf|p2.pdf|"}]}`, and each listed
//! name is a page file under a fixed download prefix.

use super::{EditionRun, HarvestContext};
use crate::config::SourceConfig;
use crate::download::AssetTarget;
use crate::error::{HarvestError, Result};
use crate::fetch::{Fetch, FetchRequest};
use crate::template::{Template, TemplateContext, Vars};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Substitute template strings anywhere inside a JSON request body.
pub fn render_body(body: &Value, vars: &Vars<'_>) -> Result<Value> {
    Ok(match body {
        Value::String(s) => Value::String(Template::parse(s, TemplateContext::Text)?.render(vars)?),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_body(v, vars)).collect::<Result<_>>()?),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), render_body(v, vars)?)))
                .collect::<Result<_>>()?,
        ),
        other => other.clone(),
    })
}

/// Page values found at `pointer`, in order.
///
/// The pointer may resolve to an array or a single item. From each item the
/// `field` (or the item itself, when it is a string or number) is taken and
/// split on `split`; blank pieces are dropped.
pub fn extract_values(
    json: &Value,
    pointer: &str,
    field: Option<&str>,
    split: Option<&str>,
    url: &str,
) -> Result<Vec<String>> {
    let shape_err = || HarvestError::JsonShape {
        url: url.to_string(),
        pointer: pointer.to_string(),
    };
    let found = json.pointer(pointer).ok_or_else(shape_err)?;
    let items: Vec<&Value> = match found {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    };

    let mut values = Vec::new();
    for item in items {
        let raw = match field {
            Some(field) => item.get(field),
            None => Some(item),
        };
        let text = match raw {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Null) | None => continue,
            Some(_) => return Err(shape_err()),
        };
        let pieces: Vec<&str> = match split {
            Some(sep) if !sep.is_empty() => text.split(sep).collect(),
            _ => vec![text.as_str()],
        };
        values.extend(
            pieces
                .into_iter()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        );
    }
    Ok(values)
}

/// Query the endpoint for the edition and download every listed page.
///
/// Pages are numbered `1..n` in the order the endpoint lists them; each
/// value is substituted as `{value}` into `asset_url`.
#[instrument(level = "info", skip_all, fields(edition = %run.edition().name))]
pub async fn harvest<F: Fetch>(ctx: &HarvestContext<'_, F>, run: &mut EditionRun) -> Result<()> {
    let SourceConfig::JsonApi {
        url,
        method,
        body,
        pointer,
        field,
        split,
        asset_url,
    } = &ctx.publication.source
    else {
        return Err(HarvestError::Config(format!(
            "publication `{}` has no JSON source",
            ctx.publication.name
        )));
    };

    let edition = run.edition().clone();
    let vars = ctx.vars(&edition);
    let api_url = Template::parse(url, TemplateContext::Url)?.render(&vars)?;
    let mut request = FetchRequest::document(&api_url).with_method(*method);
    if let Some(body) = body {
        request = request.with_json_body(render_body(body, &vars)?);
    }

    let response = ctx
        .fetcher
        .fetch(&request)
        .await
        .map_err(|e| ctx.missing_as_not_found(e))?;
    let json: Value = serde_json::from_slice(&response.body)?;
    let values = extract_values(&json, pointer, field.as_deref(), split.as_deref(), &api_url)?;
    if values.is_empty() {
        warn!(url = %api_url, "Endpoint lists no pages");
        return Err(ctx.not_found());
    }
    info!(count = values.len(), "Listed pages");

    let asset_template = Template::parse(asset_url, TemplateContext::Url)?;
    for (i, value) in values.iter().enumerate() {
        let page = i as u32 + 1;
        if i > 0 {
            ctx.pause().await;
        }
        let asset = asset_template.render(&vars.clone().with_page(page).with_value(value))?;
        debug!(page, %value, url = %asset, "Page asset");
        run.download_or_skip(ctx, &AssetTarget::page(page, asset)).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HttpMethod, parse_catalogue};
    use crate::fetch::testing::{Reply, ScriptedFetcher};
    use crate::models::Edition;
    use crate::outputs::files::Store;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::time::Duration;

    const CATALOGUE: &str = r#"
publications:
  - name: echo_of_india
    expect: pdf
    editions:
      - name: kolkata
        code: "3"
    source:
      kind: json_api
      url: "http://www.echoofindia.com/WebService/Master.asmx/GetPdfDocument"
      method: post
      body: { company_key: 1, edition_key: "{code}", day: "{date:%d/%m/%Y}" }
      pointer: /d
      field: PDF_DOCUMENT
      split: "|"
      asset_url: "http://www.echoofindia.com/Documents/PDF/{value}"
"#;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 30).unwrap()
    }

    #[test]
    fn test_render_body_keeps_types() {
        let vars = Vars::new("p", "kolkata", "3", date());
        let rendered = render_body(&json!({"company_key": 1, "edition_key": "{code}", "tags": ["{date}"]}), &vars).unwrap();
        assert_eq!(rendered, json!({"company_key": 1, "edition_key": "3", "tags": ["2025-05-30"]}));
    }

    #[test]
    fn test_extract_values_variants() {
        let data = json!({"d": [{"PDF_DOCUMENT": "a.pdf|b.pdf||"}, {"PDF_DOCUMENT": " c.pdf "}, {"OTHER": 1}]});
        assert_eq!(
            extract_values(&data, "/d", Some("PDF_DOCUMENT"), Some("|"), "u").unwrap(),
            vec!["a.pdf", "b.pdf", "c.pdf"]
        );

        let data = json!({"pages": ["1.jpg", "2.jpg"]});
        assert_eq!(extract_values(&data, "/pages", None, None, "u").unwrap(), vec!["1.jpg", "2.jpg"]);

        let data = json!({"d": {"PDF_DOCUMENT": "x.pdf"}});
        assert_eq!(extract_values(&data, "/d", Some("PDF_DOCUMENT"), None, "u").unwrap(), vec!["x.pdf"]);

        let err = extract_values(&json!({}), "/d", None, None, "u").unwrap_err();
        assert!(matches!(err, HarvestError::JsonShape { .. }));
    }

    #[tokio::test]
    async fn test_posts_and_downloads_listed_pages() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::new(tmp.path(), false);
        let publication = parse_catalogue(CATALOGUE).unwrap().publications.remove(0);
        let api = "http://www.echoofindia.com/WebService/Master.asmx/GetPdfDocument";
        let fetcher = ScriptedFetcher::new()
            .route(api, Reply::json(json!({"d": [{"PDF_DOCUMENT": "EOI_30_1.pdf|EOI_30_2.pdf|"}]})))
            .pdf("http://www.echoofindia.com/Documents/PDF/EOI_30_1.pdf")
            .pdf("http://www.echoofindia.com/Documents/PDF/EOI_30_2.pdf");
        let ctx = HarvestContext::new(&fetcher, &store, &publication, date(), Duration::ZERO).unwrap();
        let mut run = EditionRun::new(&publication, Edition::new("kolkata", "3"), date());

        harvest(&ctx, &mut run).await.unwrap();

        let calls = fetcher.calls();
        assert_eq!(calls[0].method, HttpMethod::Post);
        assert_eq!(
            calls[0].body,
            Some(json!({"company_key": 1, "edition_key": "3", "day": "30/05/2025"}))
        );
        let report = run.finish(Ok(()));
        let paths: Vec<&str> = report.artifacts.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "echo_of_india/kolkata/echo_of_india_20250530_01.pdf",
                "echo_of_india/kolkata/echo_of_india_20250530_02.pdf",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_page_list_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::new(tmp.path(), false);
        let publication = parse_catalogue(CATALOGUE).unwrap().publications.remove(0);
        let fetcher = ScriptedFetcher::new().route(
            "http://www.echoofindia.com/WebService/Master.asmx/GetPdfDocument",
            Reply::json(json!({"d": []})),
        );
        let ctx = HarvestContext::new(&fetcher, &store, &publication, date(), Duration::ZERO).unwrap();
        let mut run = EditionRun::new(&publication, Edition::new("kolkata", "3"), date());
        assert!(harvest(&ctx, &mut run).await.unwrap_err().to_string().contains("no edition found"));
    }
}
