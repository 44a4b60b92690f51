//! Fixed-size pool of row validators
//!
//! The pool is created with K validators and a semaphore of K permits. A
//! caller holds a permit for as long as it holds a validator, so at most K
//! rows are validated at once and further callers wait in `acquire`.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::row_validator::RowValidator;
use crate::errors::PoolError;

struct PoolInner {
    idle: Mutex<Vec<RowValidator>>,
    permits: Arc<Semaphore>,
    size: usize,
}

impl PoolInner {
    fn put_back(&self, validator: RowValidator) {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(validator);
    }
}

#[derive(Clone)]
pub struct ValidatorPool {
    inner: Arc<PoolInner>,
}

impl ValidatorPool {
    pub fn new(validators: Vec<RowValidator>) -> Self {
        let size = validators.len();
        debug!(size, "Validator pool created");

        Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(validators),
                permits: Arc::new(Semaphore::new(size)),
                size,
            }),
        }
    }

    /// Wait for a free validator. Fails once the pool has been closed.
    pub async fn acquire(&self) -> Result<ValidatorGuard, PoolError> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        let validator = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .ok_or(PoolError::Closed)?;

        Ok(ValidatorGuard {
            validator: Some(validator),
            inner: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Return a validator early. Equivalent to dropping the guard.
    pub fn release(&self, guard: ValidatorGuard) {
        drop(guard);
    }

    /// Validators currently free
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    pub fn size(&self) -> usize {
        self.inner.size
    }

    pub fn is_closed(&self) -> bool {
        self.inner.permits.is_closed()
    }

    /// Wait for every outstanding validator to come back, then close them all.
    ///
    /// Rows already in flight finish first. Afterwards `acquire` fails with
    /// [`PoolError::Closed`] and every validator has dropped its queue
    /// handles. Returns the number of validators closed.
    pub async fn close_all(&self) -> usize {
        let size = u32::try_from(self.inner.size).unwrap_or(u32::MAX);
        match Arc::clone(&self.inner.permits).acquire_many_owned(size).await {
            Ok(permits) => {
                self.inner.permits.close();
                permits.forget();
            }
            Err(_) => {
                warn!("Validator pool already closed");
                return 0;
            }
        }

        let validators: Vec<RowValidator> = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        let closed = validators.len();
        for mut validator in validators {
            validator.close();
        }

        info!(validators = closed, "Validator pool closed");
        closed
    }
}

/// A validator checked out of a [`ValidatorPool`]; returned on drop
pub struct ValidatorGuard {
    validator: Option<RowValidator>,
    inner: Arc<PoolInner>,
    // released after the validator is back in the idle set
    _permit: OwnedSemaphorePermit,
}

impl Deref for ValidatorGuard {
    type Target = RowValidator;

    fn deref(&self) -> &RowValidator {
        self.validator
            .as_ref()
            .unwrap_or_else(|| unreachable!("validator taken before drop"))
    }
}

impl DerefMut for ValidatorGuard {
    fn deref_mut(&mut self) -> &mut RowValidator {
        self.validator
            .as_mut()
            .unwrap_or_else(|| unreachable!("validator taken before drop"))
    }
}

impl Drop for ValidatorGuard {
    fn drop(&mut self) {
        if let Some(validator) = self.validator.take() {
            self.inner.put_back(validator);
        }
    }
}
