pub mod parallel_quantizer;
pub mod roundtrip_checker;

pub use parallel_quantizer::{
    decode_variable, DecodeOutcome, ParallelQuantizer, QuantizationOutcome, VariableFailure,
};
pub use roundtrip_checker::{
    BoundViolation, RoundTripChecker, RoundTripReport, VariableStatistics,
};
