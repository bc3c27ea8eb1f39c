//! Staged multi-key commit with tracked rollback.
//!
//! The engine commits every key independently. A `StagedCommit` applies an
//! ordered list of mutations, snapshotting each key's prior value just
//! before touching it. If a mutation fails, the applied prefix is undone in
//! reverse order by writing the snapshots back.

use crate::error::{DevDbError, Result};
use crate::key::StoreKey;
use crate::store::KvEngine;
use tracing::{error, warn};

#[derive(Debug)]
enum Mutation {
    Put { key: StoreKey, value: Vec<u8> },
    Remove { key: StoreKey },
}

impl Mutation {
    fn key(&self) -> &StoreKey {
        match self {
            Mutation::Put { key, .. } | Mutation::Remove { key } => key,
        }
    }
}

/// A key that was written, with what it held before.
struct Applied {
    key: StoreKey,
    prior: Option<Vec<u8>>,
}

pub(crate) struct StagedCommit {
    operation: &'static str,
    mutations: Vec<Mutation>,
}

impl StagedCommit {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            mutations: Vec::new(),
        }
    }

    pub fn put(&mut self, key: StoreKey, value: Vec<u8>) {
        self.mutations.push(Mutation::Put { key, value });
    }

    pub fn remove(&mut self, key: StoreKey) {
        self.mutations.push(Mutation::Remove { key });
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Apply every mutation in order.
    ///
    /// On failure the applied mutations are rolled back. The caller gets
    /// the original error if the rollback restored every key, or an
    /// `Inconsistency` naming the keys it could not restore.
    pub fn apply(self, engine: &mut dyn KvEngine) -> Result<()> {
        let mut applied: Vec<Applied> = Vec::with_capacity(self.mutations.len());

        for mutation in self.mutations {
            match apply_one(engine, &mutation) {
                Ok(prior) => applied.push(Applied {
                    key: mutation.key().clone(),
                    prior,
                }),
                Err(err) => {
                    return Err(rollback(engine, self.operation, mutation.key(), applied, err));
                }
            }
        }

        Ok(())
    }
}

fn apply_one(engine: &mut dyn KvEngine, mutation: &Mutation) -> Result<Option<Vec<u8>>> {
    let prior = engine.fetch(mutation.key().as_bytes())?;
    match mutation {
        Mutation::Put { key, value } => engine.store(key.as_bytes(), value)?,
        Mutation::Remove { key } => {
            engine.delete(key.as_bytes())?;
        }
    }
    Ok(prior)
}

fn rollback(
    engine: &mut dyn KvEngine,
    operation: &'static str,
    failed_key: &StoreKey,
    applied: Vec<Applied>,
    cause: DevDbError,
) -> DevDbError {
    if applied.is_empty() {
        return cause;
    }

    warn!(
        "{} failed at {}: {}; rolling back {} key(s)",
        operation,
        failed_key,
        cause,
        applied.len()
    );

    let mut unrestored = Vec::new();
    for Applied { key, prior } in applied.into_iter().rev() {
        let restored = match &prior {
            Some(value) => engine.store(key.as_bytes(), value),
            None => engine.delete(key.as_bytes()).map(|_| ()),
        };
        if let Err(e) = restored {
            warn!("Failed to restore {} during rollback: {}", key, e);
            unrestored.push(key.to_string());
        }
    }

    if unrestored.is_empty() {
        return cause;
    }

    unrestored.reverse();
    error!(
        "{} left {} key(s) in a partial state: {}",
        operation,
        unrestored.len(),
        unrestored.join(", ")
    );

    DevDbError::Inconsistency {
        operation: operation.to_string(),
        keys: unrestored,
        message: format!("rollback after failure at {} was incomplete: {}", failed_key, cause),
    }
}
