use super::retry::RetryPolicy;
use super::{FetchError, Transport};
use crate::model::transaction::EnhancedTransaction;
use serde_json::Value;
use std::collections::VecDeque;
use std::{thread, time::Duration};
use thiserror::Error;
use tracing::{info, warn};

/// Pause between successful page requests, so a long export does not hammer
/// the API. Independent of the retry backoff.
const PAGE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum HistoryError {
    /// Retries exhausted for a page. Fatal: pages are sequential, so a gap
    /// here would corrupt the cursor chain.
    #[error("Giving up on page after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        source: FetchError,
    },

    /// The last transaction in a page carried no signature to paginate from.
    #[error("Transaction history page is missing a trailing signature")]
    MissingCursor,
}

/// Lazy walk over an address's full transaction history, newest first.
///
/// Pulls one page at a time from the [`Transport`], paginating with the
/// `before` cursor until the API returns an empty page. Restartable from
/// scratch only; there is no resume state kept across runs.
///
/// Transactions that fail to deserialize are skipped with a warning, so one
/// odd transaction cannot sink a whole export. Errors yielded by the iterator
/// are fatal and end the walk.
pub struct History<'a, T> {
    transport: &'a T,
    address: &'a str,
    policy: RetryPolicy,
    page_delay: Duration,
    before: Option<String>,
    buffer: VecDeque<Value>,
    pages_fetched: usize,
    done: bool,
}

impl<'a, T: Transport> History<'a, T> {
    pub fn new(transport: &'a T, address: &'a str) -> Self {
        Self::with_policy(transport, address, RetryPolicy::default(), PAGE_DELAY)
    }

    /// Constructor with the retry policy and politeness delay exposed. Tests
    /// use this to drop the delay to zero.
    pub fn with_policy(
        transport: &'a T,
        address: &'a str,
        policy: RetryPolicy,
        page_delay: Duration,
    ) -> Self {
        Self {
            transport,
            address,
            policy,
            page_delay,
            before: None,
            buffer: VecDeque::new(),
            pages_fetched: 0,
            done: false,
        }
    }

    fn next_page(&mut self) -> Option<Result<(), HistoryError>> {
        if self.pages_fetched > 0 {
            thread::sleep(self.page_delay);
        }

        let page = match self.policy.run(|| {
            self.transport
                .get_page(self.address, self.before.as_deref())
        }) {
            Ok(page) => page,
            Err(source) => {
                self.done = true;
                return Some(Err(HistoryError::Exhausted {
                    attempts: self.policy.max_attempts(),
                    source,
                }));
            }
        };
        self.pages_fetched += 1;

        if page.is_empty() {
            info!(
                "End of history for `{address}` after {pages} pages",
                address = self.address,
                pages = self.pages_fetched,
            );
            self.done = true;
            return None;
        }

        // The cursor advances off the raw page, so even a malformed trailing
        // transaction keeps pagination intact as long as it has a signature.
        match page
            .last()
            .and_then(|tx| tx.get("signature"))
            .and_then(Value::as_str)
        {
            Some(signature) => self.before = Some(signature.to_string()),
            None => {
                self.done = true;
                return Some(Err(HistoryError::MissingCursor));
            }
        }

        self.buffer.extend(page);
        Some(Ok(()))
    }
}

impl<T: Transport> Iterator for History<'_, T> {
    type Item = Result<EnhancedTransaction, HistoryError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            while let Some(raw) = self.buffer.pop_front() {
                match serde_json::from_value::<EnhancedTransaction>(raw) {
                    Ok(tx) => return Some(Ok(tx)),
                    Err(err) => {
                        warn!("Skipping malformed transaction: {err}");
                    }
                }
            }

            if self.done {
                return None;
            }
            match self.next_page() {
                Some(Ok(())) => {}
                Some(Err(err)) => return Some(Err(err)),
                None => return None,
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::Page;
    use serde_json::json;
    use std::cell::RefCell;
    use tracing_test::traced_test;

    /// Scripted transport: pops one canned response per request and records
    /// the cursor it was asked for. An exhausted script returns empty pages.
    #[derive(Default)]
    pub(crate) struct MockTransport {
        responses: RefCell<VecDeque<Result<Page, FetchError>>>,
        pub(crate) cursors: RefCell<Vec<Option<String>>>,
    }

    impl MockTransport {
        pub(crate) fn new(responses: Vec<Result<Page, FetchError>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                cursors: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for MockTransport {
        fn get_page(&self, _address: &str, before: Option<&str>) -> Result<Page, FetchError> {
            self.cursors.borrow_mut().push(before.map(String::from));
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    pub(crate) fn tx_json(signature: &str) -> Value {
        json!({
            "signature": signature,
            "timestamp": 1_700_000_000,
            "fee": 5000,
            "nativeTransfers": [],
            "tokenTransfers": [],
        })
    }

    fn fast_history<'a>(transport: &'a MockTransport, address: &'a str) -> History<'a, MockTransport> {
        History::with_policy(transport, address, RetryPolicy::new(1), Duration::ZERO)
    }

    #[test]
    #[traced_test]
    fn yields_every_page_in_order_then_terminates() {
        let _ = tracing_log::LogTracer::init();

        let transport = MockTransport::new(vec![
            Ok(vec![tx_json("sig-1"), tx_json("sig-2")]),
            Ok(vec![tx_json("sig-3")]),
            Ok(Vec::new()),
        ]);

        let signatures: Vec<_> = fast_history(&transport, "wallet")
            .map(|tx| tx.unwrap().signature)
            .collect();

        assert_eq!(signatures, ["sig-1", "sig-2", "sig-3"]);
        // Two non-empty pages plus the terminating empty page.
        assert_eq!(transport.cursors.borrow().len(), 3);
    }

    #[test]
    fn cursor_is_the_last_signature_of_the_previous_page() {
        let transport = MockTransport::new(vec![
            Ok(vec![tx_json("sig-1"), tx_json("sig-2")]),
            Ok(vec![tx_json("sig-3")]),
            Ok(Vec::new()),
        ]);

        for tx in fast_history(&transport, "wallet") {
            tx.unwrap();
        }

        let cursors = transport.cursors.borrow();
        assert_eq!(
            *cursors,
            [None, Some("sig-2".to_string()), Some("sig-3".to_string())]
        );
    }

    #[test]
    #[traced_test]
    fn malformed_transactions_are_skipped() {
        let _ = tracing_log::LogTracer::init();

        // Second element has no usable timestamp; the trailing one still
        // provides the cursor.
        let transport = MockTransport::new(vec![
            Ok(vec![
                tx_json("sig-1"),
                json!({ "signature": "sig-bad", "timestamp": "not-a-number" }),
                tx_json("sig-2"),
            ]),
            Ok(Vec::new()),
        ]);

        let signatures: Vec<_> = fast_history(&transport, "wallet")
            .map(|tx| tx.unwrap().signature)
            .collect();

        assert_eq!(signatures, ["sig-1", "sig-2"]);
        assert_eq!(
            transport.cursors.borrow().last().unwrap().as_deref(),
            Some("sig-2")
        );
    }

    #[test]
    fn retry_exhaustion_is_fatal() {
        let transport = MockTransport::new(vec![Err(FetchError::RateLimited)]);

        let mut history = fast_history(&transport, "wallet");
        match history.next() {
            Some(Err(HistoryError::Exhausted { attempts, source })) => {
                assert_eq!(attempts, 1);
                assert!(matches!(source, FetchError::RateLimited));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert!(history.next().is_none());
    }

    #[test]
    fn page_without_trailing_signature_is_fatal() {
        let transport = MockTransport::new(vec![Ok(vec![json!({ "no": "signature" })])]);

        let mut history = fast_history(&transport, "wallet");
        assert!(matches!(
            history.next(),
            Some(Err(HistoryError::MissingCursor))
        ));
        assert!(history.next().is_none());
    }
}
