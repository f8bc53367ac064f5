// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Entity-agnostic CRUD contract. Every call is a fresh round trip: no
//! retries and no caching. Callers own error reporting.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ids::ActorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    Json,
    Multipart,
}

impl BodyEncoding {
    pub const fn from_multipart(is_multipart: bool) -> Self {
        if is_multipart {
            Self::Multipart
        } else {
            Self::Json
        }
    }
}

/// Transport attribute carrying the actor of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorAttribute {
    CreatedBy,
    ModifiedBy,
    DeletedBy,
}

impl ActorAttribute {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatedBy => "CreatedBy",
            Self::ModifiedBy => "ModifiedBy",
            Self::DeletedBy => "DeletedBy",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl GatewayResponse {
    pub fn ok(body: serde_json::Value) -> Self {
        Self { status: 200, body }
    }

    /// Id of a freshly created entity, when the server echoes one back.
    pub fn created_id(&self) -> Option<i64> {
        match &self.body {
            serde_json::Value::Number(number) => number.as_i64(),
            serde_json::Value::Object(map) => map.get("id").and_then(serde_json::Value::as_i64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: u32,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(alias = "data", alias = "records")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            total_pages: 0,
        }
    }
}

pub trait Gateway {
    fn create(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
        actor: &ActorId,
        encoding: BodyEncoding,
    ) -> Result<GatewayResponse>;

    fn fetch_all_json(&self, endpoint: &str) -> Result<Vec<serde_json::Value>>;

    fn fetch_by_id_json(&self, endpoint: &str, id: &str) -> Result<serde_json::Value>;

    fn fetch_paged_json(&self, endpoint: &str, page: PageRequest)
    -> Result<Page<serde_json::Value>>;

    fn update(
        &self,
        endpoint: &str,
        id: &str,
        payload: &serde_json::Value,
        actor: &ActorId,
        encoding: BodyEncoding,
    ) -> Result<GatewayResponse>;

    fn remove(&self, endpoint: &str, id: &str, actor: &ActorId) -> Result<GatewayResponse>;
}

/// Typed reads layered over [`Gateway`].
pub trait GatewayExt: Gateway {
    fn fetch_all<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>> {
        self.fetch_all_json(endpoint)?
            .into_iter()
            .map(|row| decode_row(endpoint, row))
            .collect()
    }

    fn fetch_by_id<T: DeserializeOwned>(&self, endpoint: &str, id: &str) -> Result<T> {
        decode_row(endpoint, self.fetch_by_id_json(endpoint, id)?)
    }

    fn fetch_paged<T: DeserializeOwned>(&self, endpoint: &str, page: PageRequest) -> Result<Page<T>> {
        let raw = self.fetch_paged_json(endpoint, page)?;
        Ok(Page {
            items: raw
                .items
                .into_iter()
                .map(|row| decode_row(endpoint, row))
                .collect::<Result<_>>()?,
            total_count: raw.total_count,
            total_pages: raw.total_pages,
        })
    }
}

impl<G: Gateway + ?Sized> GatewayExt for G {}

fn decode_row<T: DeserializeOwned>(endpoint: &str, row: serde_json::Value) -> Result<T> {
    serde_json::from_value(row).with_context(|| format!("decode {endpoint} row"))
}

#[cfg(test)]
mod tests {
    use super::{ActorAttribute, BodyEncoding, GatewayResponse, Page};
    use anyhow::Result;

    #[test]
    fn page_accepts_common_item_keys() -> Result<()> {
        let page: Page<i64> =
            serde_json::from_str(r#"{"data":[1,2],"totalCount":12,"totalPages":6}"#)?;
        assert_eq!(page.items, vec![1, 2]);
        assert_eq!(page.total_pages, 6);

        let bare: Page<i64> = serde_json::from_str(r#"{"items":[]}"#)?;
        assert_eq!(bare, Page::empty());
        Ok(())
    }

    #[test]
    fn created_id_reads_object_or_bare_number() {
        assert_eq!(
            GatewayResponse::ok(serde_json::json!({ "id": 9 })).created_id(),
            Some(9)
        );
        assert_eq!(GatewayResponse::ok(serde_json::json!(14)).created_id(), Some(14));
        assert_eq!(GatewayResponse::ok(serde_json::Value::Null).created_id(), None);
    }

    #[test]
    fn actor_attributes_use_wire_names() {
        assert_eq!(ActorAttribute::CreatedBy.as_str(), "CreatedBy");
        assert_eq!(ActorAttribute::DeletedBy.as_str(), "DeletedBy");
        assert_eq!(BodyEncoding::from_multipart(true), BodyEncoding::Multipart);
    }
}
