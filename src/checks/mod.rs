//! Rules the parser applies at specific productions: call arguments,
//! signatures, future imports and control flow.

pub mod arguments;
pub mod flow;
pub mod future;
pub mod parameters;

pub use arguments::{ArgumentKind, CallArgument, check_call_arguments};
pub use flow::{FlowBlock, Frame, FrameKind};
pub use future::{FutureImports, FutureStatement};
pub use parameters::{Parameter, ParameterKind, check_parameters};
