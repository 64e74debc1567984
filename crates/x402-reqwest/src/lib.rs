//! Reqwest middleware for automatic x402 payment handling.
//!
//! This crate provides an [`X402Client`] that plugs into `reqwest` as
//! middleware to transparently retry `402 Payment Required` responses: it
//! extracts the server's accepted payment options, signs one with a
//! registered [`ClientScheme`], and retries the request with the payment
//! header attached.
//!
//! ## Quickstart
//!
//! ```rust,ignore
//! use x402_reqwest::{ReqwestWithPayments, ReqwestWithPaymentsBuild, X402Client};
//! use x402_reqwest::schemes::Eip3009Client;
//! use alloy_signer_local::PrivateKeySigner;
//! use std::sync::Arc;
//! use reqwest::Client;
//!
//! let signer = Arc::new("PRIVATE_KEY".parse::<PrivateKeySigner>().unwrap());
//! let x402_client = X402Client::new().register(Eip3009Client::new(signer));
//!
//! let http_client = Client::new().with_payments(x402_client).build();
//! let response = http_client.get("https://api.example.com/protected").send().await?;
//! ```
//!
//! ## Registering scheme clients
//!
//! - [`schemes::Eip3009Client`] - Exact-EVM, EIP-3009 `transferWithAuthorization`
//! - [`schemes::Eip2612Client`] - Upto-EVM, EIP-2612 `Permit`
//! - [`schemes::SolanaExactClient`] - Exact-SVM
//! - [`schemes::StarknetClient`] - Exact-Starknet, via an injected signer
//!
//! ## Payment selection and the permit cache
//!
//! [`FirstMatch`] is the default [`PaymentSelector`]; override it with
//! [`X402Client::with_selector`]. Signed Upto permits are cached per
//! `(network, asset)` in a [`PermitCache`] and reused across requests until
//! the server rejects one as `cap_exhausted` or `session_closed`, at which
//! point the retry loop signs and caches a fresh one.

mod builder;
mod client;
mod error;
mod permit_cache;
mod scheme;
pub mod schemes;

pub use builder::{ReqwestWithPayments, ReqwestWithPaymentsBuild, ReqwestWithPaymentsBuilder};
pub use client::X402Client;
pub use error::X402Error;
pub use permit_cache::PermitCache;
pub use scheme::{ClientScheme, ClientSchemes, FirstMatch, PaymentCandidate, PaymentSelector};
