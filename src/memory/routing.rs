// Copyright 2024-2026 AQUA Contributors
// Licensed under the Apache License, Version 2.0

//! Static requester -> pool routing.
//!
//! The table is parsed once from a `src:dst,src:dst` string before the
//! manager serves traffic and is never mutated afterwards.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error::StoreError;
use super::pool::PoolId;

/// Identity of the device issuing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequesterId(pub i64);

impl RequesterId {
    /// Sentinel for a missing or unparseable identity. Never routable.
    pub const UNMAPPED: Self = Self(-1);

    /// Interpret a transport-supplied header value.
    ///
    /// Missing or non-numeric values map to [`RequesterId::UNMAPPED`].
    pub fn from_header(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(Self)
            .unwrap_or(Self::UNMAPPED)
    }

    pub fn is_unmapped(&self) -> bool {
        self.0 < 0
    }
}

impl Default for RequesterId {
    fn default() -> Self {
        Self::UNMAPPED
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised while building a routing table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("Routing configuration is empty. Format = src:dst,src:dst")]
    Empty,

    #[error("Malformed routing pair '{0}', expected src:dst")]
    MalformedPair(String),

    #[error("Invalid id '{0}' in routing configuration")]
    InvalidId(String),

    #[error("Requester id must be non-negative, got {0}")]
    NegativeRequester(i64),

    #[error("Requester {0} is routed more than once")]
    DuplicateRequester(i64),
}

/// Immutable lookup from requester identity to destination pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    routes: HashMap<RequesterId, PoolId>,
}

impl RoutingTable {
    /// Parse a `src:dst,src:dst,...` configuration string.
    pub fn parse(spec: &str) -> Result<Self, RoutingError> {
        if spec.trim().is_empty() {
            return Err(RoutingError::Empty);
        }

        let pairs = spec
            .split(',')
            .map(|pair| {
                let mut parts = pair.split(':');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(src), Some(dst), None) => Ok((parse_id(src)?, parse_id(dst)?)),
                    _ => Err(RoutingError::MalformedPair(pair.to_string())),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_pairs(pairs)
    }

    /// Build a table from already-parsed `(requester, pool)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, RoutingError>
    where
        I: IntoIterator<Item = (i64, PoolId)>,
    {
        let mut routes = HashMap::new();
        for (src, dst) in pairs {
            if src < 0 {
                return Err(RoutingError::NegativeRequester(src));
            }
            if routes.insert(RequesterId(src), dst).is_some() {
                return Err(RoutingError::DuplicateRequester(src));
            }
        }
        Ok(Self { routes })
    }

    /// Resolve the pool a requester is allowed to allocate from.
    pub fn resolve(&self, requester: RequesterId) -> Result<PoolId, StoreError> {
        self.routes
            .get(&requester)
            .copied()
            .ok_or(StoreError::Unmapped(requester))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes sorted by requester id.
    pub fn routes(&self) -> Vec<(RequesterId, PoolId)> {
        let mut routes: Vec<_> = self.routes.iter().map(|(k, v)| (*k, *v)).collect();
        routes.sort_unstable_by_key(|(src, _)| src.0);
        routes
    }
}

impl FromStr for RoutingTable {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_id(raw: &str) -> Result<i64, RoutingError> {
    let trimmed = raw.trim();
    trimmed
        .parse::<i64>()
        .map_err(|_| RoutingError::InvalidId(trimmed.to_string()))
}
