use std::io::{self, BufRead, Write};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, info};
use parking_lot::Mutex;
use thiserror::Error;
use treefs::TreeFs;

use crate::command::{Command, ParseError};

/// Commands parsed ahead of the workers before the reader blocks.
pub const QUEUE_CAPACITY: usize = 10;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: ParseError,
    },
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("a worker thread panicked")]
    WorkerPanicked,
}

/// Applies every command in `input` to `fs` using `threads` workers and writes
/// one status line per command to `status`.
///
/// A single reader thread parses the input and feeds a bounded queue; workers
/// take commands off the queue until the reader hangs up. On a malformed line
/// the reader stops, the workers drain what was already queued, and the parse
/// error is returned. Returns the number of commands applied.
pub fn run_batch<R, W>(
    fs: &TreeFs,
    input: R,
    threads: usize,
    status: &Mutex<W>,
) -> Result<usize, BatchError>
where
    R: BufRead + Send,
    W: Write + Send,
{
    let threads = threads.max(1);
    thread::scope(|scope| {
        let (tx, rx) = bounded(QUEUE_CAPACITY);
        let reader = scope.spawn(move || read_commands(input, tx));
        let workers: Vec<_> = (0..threads)
            .map(|_| {
                let rx = rx.clone();
                scope.spawn(move || apply_commands(fs, rx, status))
            })
            .collect();
        drop(rx);

        let mut applied = 0;
        let mut worker_error = None;
        for worker in workers {
            match worker.join().map_err(|_| BatchError::WorkerPanicked)? {
                Ok(count) => applied += count,
                Err(e) => worker_error = Some(e),
            }
        }
        let read = reader.join().map_err(|_| BatchError::WorkerPanicked)?;

        read?;
        if let Some(e) = worker_error {
            return Err(e.into());
        }
        info!("applied {} commands with {} workers", applied, threads);
        Ok(applied)
    })
}

fn read_commands<R: BufRead>(input: R, queue: Sender<Command>) -> Result<(), BatchError> {
    for (number, line) in input.lines().enumerate() {
        let command = match Command::parse(&line?) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(source) => {
                return Err(BatchError::Parse {
                    line: number + 1,
                    source,
                })
            }
        };
        if queue.send(command).is_err() {
            debug!("all workers exited, stopping input");
            break;
        }
    }
    Ok(())
}

fn apply_commands<W: Write>(
    fs: &TreeFs,
    queue: Receiver<Command>,
    status: &Mutex<W>,
) -> io::Result<usize> {
    let mut applied = 0;
    for command in queue.iter() {
        let code = command.apply(fs);
        writeln!(status.lock(), "{}", command.status(code))?;
        applied += 1;
    }
    Ok(applied)
}
