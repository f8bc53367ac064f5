// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::multipart::Form;
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use serde::Deserialize;
use society_app::{
    ActorAttribute, ActorId, BodyEncoding, Gateway, GatewayResponse, Page, PageRequest,
};
use std::time::Duration;
use url::Url;

/// Parses a backend base URL: http or https, with a host, able to take
/// endpoint path segments.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        bail!("server.base_url must not be empty");
    }
    let parsed = Url::parse(trimmed)
        .with_context(|| format!("server.base_url {trimmed:?} is not a valid URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!(
            "server.base_url must use http or https, got {:?}",
            parsed.scheme()
        );
    }
    if parsed.cannot_be_a_base() {
        bail!("server.base_url {trimmed:?} cannot carry endpoint paths");
    }
    Ok(parsed)
}

/// The CRUD gateway over a REST backend laid out as
/// `<base>/<endpoint>[/<id>]`.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: Url,
    timeout: Duration,
    http: HttpClient,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = parse_base_url(base_url)?;
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url: parsed,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Checks that the server answers at all. Any response below 500 counts.
    pub fn ping(&self) -> Result<()> {
        let response = self
            .http
            .get(self.base_url.clone())
            .send()
            .map_err(|error| connection_error(self.base_url(), error))?;

        let status = response.status();
        if status.is_server_error() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        tracing::debug!(url = %self.base_url, status = status.as_u16(), "server reachable");
        Ok(())
    }

    fn endpoint_url(&self, endpoint: &str, id: Option<&str>) -> Result<Url> {
        let endpoint = endpoint.trim_matches('/');
        if endpoint.is_empty() {
            bail!("endpoint must not be empty");
        }

        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| anyhow!("{} cannot carry endpoint paths", self.base_url()))?;
            segments.pop_if_empty();
            segments.extend(endpoint.split('/'));
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn execute(&self, method: &str, url: &Url, request: RequestBuilder) -> Result<GatewayResponse> {
        let response = request
            .send()
            .map_err(|error| connection_error(self.base_url(), error))?;

        let status = response.status();
        let body = response
            .text()
            .with_context(|| format!("read response of {method} {url}"))?;
        tracing::debug!(%method, %url, status = status.as_u16(), "gateway round trip");

        if !status.is_success() {
            return Err(clean_error_response(status, &body));
        }

        Ok(GatewayResponse {
            status: status.as_u16(),
            body: parse_body(&body),
        })
    }

    fn write(
        &self,
        request: RequestBuilder,
        payload: &serde_json::Value,
        actor: (ActorAttribute, &ActorId),
        encoding: BodyEncoding,
    ) -> Result<RequestBuilder> {
        let request = request.header(actor.0.as_str(), actor.1.as_str());
        Ok(match encoding {
            BodyEncoding::Json => request.json(payload),
            BodyEncoding::Multipart => request.multipart(multipart_form(payload)?),
        })
    }
}

impl Gateway for HttpGateway {
    fn create(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
        actor: &ActorId,
        encoding: BodyEncoding,
    ) -> Result<GatewayResponse> {
        let url = self.endpoint_url(endpoint, None)?;
        let request = self.write(
            self.http.post(url.clone()),
            payload,
            (ActorAttribute::CreatedBy, actor),
            encoding,
        )?;
        self.execute("POST", &url, request)
    }

    fn fetch_all_json(&self, endpoint: &str) -> Result<Vec<serde_json::Value>> {
        let url = self.endpoint_url(endpoint, None)?;
        let response = self.execute("GET", &url, self.http.get(url.clone()))?;
        match response.body {
            serde_json::Value::Array(rows) => Ok(rows),
            serde_json::Value::Null => Ok(Vec::new()),
            other => {
                let page: Page<serde_json::Value> = serde_json::from_value(other)
                    .with_context(|| format!("decode {endpoint} list"))?;
                Ok(page.items)
            }
        }
    }

    fn fetch_by_id_json(&self, endpoint: &str, id: &str) -> Result<serde_json::Value> {
        let url = self.endpoint_url(endpoint, Some(id))?;
        let response = self.execute("GET", &url, self.http.get(url.clone()))?;
        if response.body.is_null() {
            bail!("{endpoint} {id} came back empty");
        }
        Ok(response.body)
    }

    fn fetch_paged_json(
        &self,
        endpoint: &str,
        page: PageRequest,
    ) -> Result<Page<serde_json::Value>> {
        let mut url = self.endpoint_url(endpoint, None)?;
        url.query_pairs_mut()
            .append_pair("pageNumber", &page.number.to_string())
            .append_pair("pageSize", &page.size.to_string());

        let response = self.execute("GET", &url, self.http.get(url.clone()))?;
        match response.body {
            serde_json::Value::Array(rows) => Ok(Page {
                total_count: rows.len() as u64,
                total_pages: u32::from(!rows.is_empty()),
                items: rows,
            }),
            serde_json::Value::Null => Ok(Page::empty()),
            other => serde_json::from_value(other)
                .with_context(|| format!("decode {endpoint} page {}", page.number)),
        }
    }

    fn update(
        &self,
        endpoint: &str,
        id: &str,
        payload: &serde_json::Value,
        actor: &ActorId,
        encoding: BodyEncoding,
    ) -> Result<GatewayResponse> {
        let url = self.endpoint_url(endpoint, Some(id))?;
        let request = self.write(
            self.http.put(url.clone()),
            payload,
            (ActorAttribute::ModifiedBy, actor),
            encoding,
        )?;
        self.execute("PUT", &url, request)
    }

    fn remove(&self, endpoint: &str, id: &str, actor: &ActorId) -> Result<GatewayResponse> {
        let url = self.endpoint_url(endpoint, Some(id))?;
        let request = self
            .http
            .delete(url.clone())
            .header(ActorAttribute::DeletedBy.as_str(), actor.as_str());
        self.execute("DELETE", &url, request)
    }
}

/// One text part per top-level field. Nulls are left out; nested values
/// travel as JSON text.
fn multipart_form(payload: &serde_json::Value) -> Result<Form> {
    let Some(fields) = payload.as_object() else {
        bail!("multipart payload must be a JSON object");
    };

    let mut form = Form::new();
    for (name, value) in fields {
        let text = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        form = form.text(name.clone(), text);
    }
    Ok(form)
}

fn parse_body(body: &str) -> serde_json::Value {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| serde_json::Value::String(trimmed.to_owned()))
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!("cannot reach {base_url} -- check [server].base_url ({error})")
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
    title: Option<String>,
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Text(String),
    Object { message: Option<String> },
}

impl ErrorEnvelope {
    fn into_message(self) -> Option<String> {
        let nested = match self.error {
            Some(ErrorDetail::Text(text)) => Some(text),
            Some(ErrorDetail::Object { message }) => message,
            None => None,
        };
        [self.message, nested, self.title]
            .into_iter()
            .flatten()
            .find(|message| !message.trim().is_empty())
    }
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(message) = parsed.into_message()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), message);
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') && !trimmed.contains('<') {
        return anyhow!("server error ({}): {}", status.as_u16(), trimmed);
    }

    anyhow!("server returned {}", status.as_u16())
}
