//! Background workers.

pub mod dispatcher;

pub use dispatcher::{
    DispatcherError, DispatcherHandle, QueueDispatcher, WorkerEvent, WorkerExit, WorkerHandle,
};
