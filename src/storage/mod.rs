//! Transaction persistence contract.
//!
//! - [`records`] - Transaction header, body and digest records
//! - [`txnlog`] - Entry marshalling and framed transaction log files

pub mod records;
pub mod txnlog;
