// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::{IrodsError, Result};

/// Runs one socket operation under the operation deadline and the
/// connection's cancellation token. Timeouts and token fires map to
/// `Cancelled`; the caller is expected to poison the connection.
pub(crate) async fn io_with_timeout<F, T>(
    label: &'static str,
    fut: F,
    io_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(IrodsError::Cancelled { action: label }),
        res = timeout(io_timeout, fut) => {
            match res {
                Ok(Ok(v)) => Ok(v),
                Ok(Err(e)) => Err(IrodsError::transport(label, e)),
                Err(_) => Err(IrodsError::Cancelled { action: label }),
            }
        }
    }
}
