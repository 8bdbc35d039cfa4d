//! Use-case services over the catalog repositories.

pub mod catalog_service;
