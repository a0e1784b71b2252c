//! Garden Operation
//!
//! Deploys and deletes a virtual garden control plane in a hosting namespace.
//! Each operation is a task graph run by `garden-flow`; every task reconciles
//! or deletes objects in a `garden-store` through `garden-reconcile`.
//!
//! # Deploy
//!
//! ```text
//!                      deploy-namespace
//!       ┌──────────────┬──────┴───────┬──────────────────┐
//!       ▼              ▼              ▼                  ▼
//! storage-class   backup-bucket   apiserver-service   apiserver-secrets
//!       └──────┬───────┘              │                  │
//!              ▼                      │                  │
//!          deploy-etcd                │                  │
//!              └──────────────────────┼──────────────────┘
//!                                     ▼
//!                      deploy-kube-apiserver-deployment
//! ```
//!
//! # Delete
//!
//! Deployments go first, then secrets and etcd, then the backup bucket.
//! The namespace is deleted last, and only when the imports ask for it.

mod deployment;
mod error;
mod etcd;
pub mod names;
mod namespace;
mod operation;
mod secrets;
mod service;
mod storage;

pub use error::OperationError;
pub use operation::Operation;
