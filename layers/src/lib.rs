//! Protocol Stack Layers Library
//! 
//! This crate implements the 5G protocol stack layers according to 3GPP Release 16.

pub mod phy;
pub mod mac;
pub mod rlc;
pub mod pdcp;
pub mod rrc;
pub mod ngap;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Common errors for protocol layers
#[derive(Error, Debug)]
pub enum LayerError {
    #[error("Invalid protocol data unit")]
    InvalidPdu,
    
    #[error("Layer not initialized")]
    NotInitialized,
    
    #[error("Resource unavailable")]
    ResourceUnavailable,
    
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    
    #[error("Processing error: {0}")]
    ProcessingError(String),
    
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
    
    #[error("CRC check failed")]
    CrcFailed,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A value fell outside its defined domain (bitset index out of range,
    /// malformed polynomial degree, etc).
    #[error("domain error: {0}")]
    Domain(String),

    /// The synchronization engine lost track of the serving cell and fell
    /// back to FIND.
    #[error("synchronization lost: {0}")]
    SyncLost(String),

    /// A channel decoder exhausted its iteration budget without a passing
    /// CRC / parity check.
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    /// An operation exceeded its allotted time budget (e.g. RF sample
    /// delivery, a blocking channel read).
    #[error("operation timed out")]
    Timeout,

    /// A received PDU did not parse to a well-formed structure (size
    /// mismatch, reserved field violation).
    #[error("malformed PDU: {0}")]
    MalformedPdu(String),

    /// A bounded resource (HARQ process table, soft buffer pool, RF ring)
    /// had no capacity left.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

/// Common trait for all protocol layers
#[async_trait]
pub trait ProtocolLayer: Send + Sync {
    /// Initialize the layer
    async fn initialize(&mut self) -> Result<(), LayerError>;
    
    /// Process incoming data from lower layer
    async fn process_uplink(&mut self, data: Bytes) -> Result<Bytes, LayerError>;
    
    /// Process outgoing data from upper layer
    async fn process_downlink(&mut self, data: Bytes) -> Result<Bytes, LayerError>;
    
    /// Shutdown the layer
    async fn shutdown(&mut self) -> Result<(), LayerError>;
}