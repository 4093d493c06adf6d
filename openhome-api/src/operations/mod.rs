//! OpenHome operations organized by service

pub mod product;
pub mod receiver;
pub mod sender;

pub use product::{
    ProductOperation, SetSourceIndexOperation, SetStandbyOperation, SourceCountOperation,
    SourceIndexOperation, SourceOperation,
};
pub use receiver::{
    PlayOperation, SendersOperation, SenderOperation, SetSenderOperation, StopOperation,
    TransportStateOperation,
};
pub use sender::MetadataOperation;
