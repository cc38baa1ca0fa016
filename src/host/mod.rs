//! Host scheduler collaborator
//!
//! The synchronizer decides what has to change; implementations of
//! [`HostScheduler`] carry it out. [`SystemdHost`] talks to the real init
//! system, while the in-memory host behind the `test-support` feature lets the
//! reconciliation logic be exercised without one.

pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod systemd;

pub use error::{HostCallError, Result};
#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryHost;
pub use systemd::SystemdHost;

use async_trait::async_trait;

#[async_trait]
pub trait HostScheduler: Send + Sync {
    /// Names of unit definitions whose file name starts with `prefix`
    async fn list_units(&self, prefix: &str) -> Result<Vec<String>>;

    async fn read_unit(&self, name: &str) -> Result<Option<String>>;

    async fn write_unit(&self, name: &str, text: &str) -> Result<()>;

    /// Removing a unit that does not exist succeeds.
    async fn remove_unit(&self, name: &str) -> Result<()>;

    async fn reload(&self) -> Result<()>;

    async fn enable(&self, name: &str) -> Result<()>;

    async fn disable(&self, name: &str) -> Result<()>;

    async fn start(&self, name: &str) -> Result<()>;

    async fn stop(&self, name: &str) -> Result<()>;

    async fn is_active(&self, name: &str) -> Result<bool>;
}

#[async_trait]
impl<T: HostScheduler + ?Sized> HostScheduler for std::sync::Arc<T> {
    async fn list_units(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).list_units(prefix).await
    }

    async fn read_unit(&self, name: &str) -> Result<Option<String>> {
        (**self).read_unit(name).await
    }

    async fn write_unit(&self, name: &str, text: &str) -> Result<()> {
        (**self).write_unit(name, text).await
    }

    async fn remove_unit(&self, name: &str) -> Result<()> {
        (**self).remove_unit(name).await
    }

    async fn reload(&self) -> Result<()> {
        (**self).reload().await
    }

    async fn enable(&self, name: &str) -> Result<()> {
        (**self).enable(name).await
    }

    async fn disable(&self, name: &str) -> Result<()> {
        (**self).disable(name).await
    }

    async fn start(&self, name: &str) -> Result<()> {
        (**self).start(name).await
    }

    async fn stop(&self, name: &str) -> Result<()> {
        (**self).stop(name).await
    }

    async fn is_active(&self, name: &str) -> Result<bool> {
        (**self).is_active(name).await
    }
}
