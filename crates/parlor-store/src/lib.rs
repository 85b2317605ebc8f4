//! # parlor-store
//!
//! JSON-file-backed record stores for the parlor backend.
//!
//! Each record type lives in its own JSON array file under the data
//! directory (`appointments.json`, `clients.json`, ...). Persistence is
//! deliberately simple: load the whole array, mutate, write it back
//! atomically. The record volume for a single shop never justifies more.
//!
//! - [`JsonStore`]: generic load/save/insert/update/remove over one file
//! - [`records`]: the typed records and appointment queries
//! - [`sendlog`]: append-only log of outbound messages
//! - [`Stores`]: the bundle of every store, opened from one data directory

#![deny(unsafe_code)]

mod error;
mod json_store;
pub mod records;
pub mod sendlog;

pub use error::StoreError;
pub use json_store::{JsonStore, Record};

use std::path::Path;

use records::{Appointment, Client, Review, ServiceOffering, StaffMember};
use sendlog::SendLog;

/// Every record store, opened from a single data directory.
pub struct Stores {
    /// Appointment bookings.
    pub appointments: JsonStore<Appointment>,
    /// Client contact records.
    pub clients: JsonStore<Client>,
    /// Offered services.
    pub services: JsonStore<ServiceOffering>,
    /// Staff members.
    pub staff: JsonStore<StaffMember>,
    /// Client reviews.
    pub reviews: JsonStore<Review>,
    /// Outbound message log.
    pub send_log: SendLog,
}

impl Stores {
    /// Open all stores under `data_dir`, creating the directory if needed.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)?;
        Ok(Self {
            appointments: JsonStore::new(data_dir.join("appointments.json")),
            clients: JsonStore::new(data_dir.join("clients.json")),
            services: JsonStore::new(data_dir.join("services.json")),
            staff: JsonStore::new(data_dir.join("staff.json")),
            reviews: JsonStore::new(data_dir.join("reviews.json")),
            send_log: SendLog::new(data_dir.join("send_log.json")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("data");
        let stores = Stores::open(&nested).unwrap();
        assert!(nested.is_dir());
        assert!(stores.appointments.load().unwrap().is_empty());
    }
}
