// # Interface Pool
//
// The dynamic pool: the fixed set of interfaces whose public addresses may be
// rotated. It is read once at startup and never changes during a run.
//
// ## File Format
//
// ```json
// {
//   "dynamic": ["eni-0a1b2c3d4e5f60718", "eni-1b2c3d4e5f6071829"]
// }
// ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;

use crate::Error;
use crate::traits::InterfaceId;

/// The set of interfaces eligible for rotation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfacePool {
    /// Interfaces whose addresses may be replaced
    pub dynamic: Vec<InterfaceId>,
}

impl InterfacePool {
    /// Create a pool from interface identifiers
    pub fn new<I, S>(interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<InterfaceId>,
    {
        Self {
            dynamic: interfaces.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a pool from its JSON representation and validate it
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let pool: Self = serde_json::from_str(json)?;
        pool.validate()?;
        Ok(pool)
    }

    /// Load and validate a pool file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!(
                "Failed to read interface pool {}: {}",
                path.display(),
                e
            ))
        })?;

        let pool = Self::from_json(&contents).map_err(|e| {
            Error::config(format!(
                "Invalid interface pool {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::debug!(
            "Loaded {} interface(s) from {}",
            pool.len(),
            path.display()
        );
        Ok(pool)
    }

    /// Validate the pool
    ///
    /// A pool must name at least one interface, with no blank or repeated
    /// identifiers.
    pub fn validate(&self) -> Result<(), Error> {
        if self.dynamic.is_empty() {
            return Err(Error::config("Interface pool is empty"));
        }

        let mut seen = HashSet::new();
        for id in &self.dynamic {
            if id.as_str().trim().is_empty() {
                return Err(Error::config("Interface pool contains a blank identifier"));
            }
            if !seen.insert(id) {
                return Err(Error::config(format!(
                    "Interface {} appears more than once in the pool",
                    id
                )));
            }
        }

        Ok(())
    }

    /// Interfaces in the pool
    pub fn interfaces(&self) -> &[InterfaceId] {
        &self.dynamic
    }

    /// Number of interfaces
    pub fn len(&self) -> usize {
        self.dynamic.len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.dynamic.is_empty()
    }
}
