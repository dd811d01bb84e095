//! Aliyun certificate renewer library.
//!
//! Renews a wildcard certificate through an ACME DNS-01 challenge (certbot with
//! an Alidns-backed auth hook), replaces the copy held in the Alibaba Cloud SSL
//! certificate store, and pushes it to Function Compute custom domains.

pub mod aliyun;
pub mod cert;
pub mod challenge;
pub mod config;
pub mod constants;
pub mod fs_utils;
pub mod propagate;
pub mod publish;
pub mod renew;
pub mod services;
pub mod status;
