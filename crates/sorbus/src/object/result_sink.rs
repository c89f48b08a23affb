use std::sync::Weak;

use crate::arg::Args;
use crate::connection::Inner;
use crate::error::{name, Error, Result};
use crate::Message;

/// The single-use completion handle of a deferred-reply method call.
///
/// A deferred method handler receives the sink by value and consumes it
/// exactly once, with either [`return_results`] or [`return_error`] —
/// possibly long after the handler itself returned, and possibly from
/// another thread. Dropping the sink without consuming it is a programming
/// error, reported to the caller as a failed method call.
///
/// [`return_results`]: Self::return_results
/// [`return_error`]: Self::return_error
#[must_use = "dropping the sink unconsumed fails the method call"]
pub struct ResultSink {
    conn: Weak<Inner>,
    call: Option<Message>,
    /// Cleared for `NoReply` methods and calls not expecting a reply.
    send_reply: bool,
}

impl ResultSink {
    pub(crate) fn new(conn: Weak<Inner>, call: Message, send_reply: bool) -> Self {
        Self {
            conn,
            call: Some(call),
            send_reply,
        }
    }

    /// Complete the call successfully, sending the given values as the
    /// reply body.
    pub fn return_results<T>(mut self, results: &T) -> Result<()>
    where
        T: Args,
    {
        let call = self.call.take().expect("sink consumed once");

        if !self.send_reply {
            return Ok(());
        }

        let mut reply = call.create_reply()?;
        reply.append_all(results)?;
        self.send(reply)
    }

    /// Complete the call with an error reply.
    pub fn return_error(mut self, error: &Error) -> Result<()> {
        let call = self.call.take().expect("sink consumed once");

        if !self.send_reply {
            return Ok(());
        }

        let reply = call.create_error_reply(error)?;
        self.send(reply)
    }

    fn send(&self, reply: Message) -> Result<()> {
        let Some(inner) = self.conn.upgrade() else {
            return Err(Error::new(
                name::DISCONNECTED,
                "connection is gone, reply cannot be delivered",
            ));
        };

        inner.queue_message(reply)?;
        Ok(())
    }
}

impl Drop for ResultSink {
    fn drop(&mut self) {
        let Some(call) = self.call.take() else {
            return;
        };

        if !self.send_reply {
            return;
        }

        log::warn!(
            "deferred reply sink for {:?} dropped without a result",
            call.member()
        );

        let error = Error::new(name::FAILED, "method handler produced no reply");

        if let Ok(reply) = call.create_error_reply(&error) {
            let _ = self.send(reply);
        }
    }
}
