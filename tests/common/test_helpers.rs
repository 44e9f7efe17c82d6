use encore::{delay_fn, terminal_fn, Args, Delay, Disposition, Handler};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Error raised by operations under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    Timeout,
    Auth,
    Corrupt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Timeout,
    Auth,
    Corrupt,
}

impl Fault {
    pub fn kind(&self) -> FaultKind {
        match self {
            Fault::Timeout => FaultKind::Timeout,
            Fault::Auth => FaultKind::Auth,
            Fault::Corrupt(_) => FaultKind::Corrupt,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Timeout => f.write_str("operation timed out"),
            Fault::Auth => f.write_str("credentials rejected"),
            Fault::Corrupt(what) => write!(f, "corrupt payload: {}", what),
        }
    }
}

impl std::error::Error for Fault {}

/// Handler invocation counters shared with the handlers they count.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    delays: Arc<AtomicUsize>,
    terminals: Arc<AtomicUsize>,
}

impl Counters {
    pub fn delays(&self) -> usize {
        self.delays.load(Ordering::SeqCst)
    }

    pub fn terminals(&self) -> usize {
        self.terminals.load(Ordering::SeqCst)
    }
}

pub fn counting_delay(counters: &Counters, delay: Delay) -> impl Handler<Fault, Output = Delay> {
    let count = counters.delays.clone();
    delay_fn(move |_e: &Fault, _args: &Args| {
        count.fetch_add(1, Ordering::SeqCst);
        Ok(delay)
    })
}

pub fn counting_terminal(
    counters: &Counters,
    disposition: Disposition,
) -> impl Handler<Fault, Output = Disposition> {
    let count = counters.terminals.clone();
    terminal_fn(move |_e: &Fault, _args: &Args| {
        count.fetch_add(1, Ordering::SeqCst);
        Ok(disposition)
    })
}
