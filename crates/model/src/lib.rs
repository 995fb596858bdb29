//! Domain types shared by the order execution pipeline. Contains no I/O;
//! everything here is cheap to clone and serializes to the camelCase wire
//! format the HTTP and queue layers speak.

pub mod order;
pub mod order_id;
pub mod quote;
pub mod status;

pub use {
    order::{OrderJob, OrderRequest, OrderType},
    quote::{QuoteRequest, QuoteResponse},
    status::{Status, StatusMessage},
};
