//! Cursor-driven pagination over the message list

use crate::error::Result;
use crate::gmail::api::MessageRef;
use crate::transport::{ListRequest, MailTransport};

/// Largest page the Gmail API will return
pub const MAX_PAGE_SIZE: usize = 500;

/// Lazy iterator over message references matching a request.
///
/// Pages are fetched on demand, one at a time, following the opaque cursor
/// the transport returns. Iteration stops once `max_results` items have been
/// yielded or the cursor is exhausted; a transport error is yielded once and
/// ends the iteration. Each call to [`list_paged`] starts from the first
/// page.
pub struct Pager<'a> {
    transport: &'a dyn MailTransport,
    request: ListRequest,
    remaining: usize,
    buffer: std::vec::IntoIter<MessageRef>,
    exhausted: bool,
    pages_fetched: usize,
}

impl<'a> Pager<'a> {
    fn new(transport: &'a dyn MailTransport, request: ListRequest, max_results: usize) -> Self {
        Self {
            transport,
            request,
            remaining: max_results,
            buffer: Vec::new().into_iter(),
            exhausted: max_results == 0,
            pages_fetched: 0,
        }
    }

    /// Number of page requests issued so far
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    fn fetch_page(&mut self) -> Result<()> {
        self.request.max_results = self.remaining.clamp(1, MAX_PAGE_SIZE);
        log::debug!(
            "Fetching message page {} (size {}, query {:?})",
            self.pages_fetched + 1,
            self.request.max_results,
            self.request.query
        );

        let response = self.transport.list_messages(&self.request)?;
        self.pages_fetched += 1;

        self.request.page_token = response.next_page_token;
        if self.request.page_token.is_none() {
            self.exhausted = true;
        }
        self.buffer = response.messages.unwrap_or_default().into_iter();
        Ok(())
    }
}

impl Iterator for Pager<'_> {
    type Item = Result<MessageRef>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.remaining == 0 {
                return None;
            }
            if let Some(item) = self.buffer.next() {
                self.remaining -= 1;
                return Some(Ok(item));
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                self.remaining = 0;
                return Some(Err(e));
            }
        }
    }
}

/// Lazily list up to `max_results` message references
pub fn list_paged(
    transport: &dyn MailTransport,
    request: ListRequest,
    max_results: usize,
) -> Pager<'_> {
    Pager::new(transport, request, max_results)
}

/// Server-side estimate of matching messages, from a one-item page
pub fn count_matching(transport: &dyn MailTransport, request: ListRequest) -> Result<u32> {
    let request = ListRequest {
        max_results: 1,
        page_token: None,
        ..request
    };
    let response = transport.list_messages(&request)?;
    Ok(response.result_size_estimate.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryTransport;

    fn transport_with(count: usize) -> InMemoryTransport {
        let transport = InMemoryTransport::new();
        for i in 0..count {
            transport.add_text_message(
                "sender@example.com",
                &format!("message {i}"),
                "body",
                &["INBOX"],
            );
        }
        transport
    }

    #[test]
    fn test_truncates_to_max_results() {
        let transport = transport_with(12);
        transport.set_page_size(5);

        let mut pager = list_paged(&transport, ListRequest::default(), 7);
        let items: Vec<_> = pager.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(items.len(), 7);
        assert_eq!(pager.pages_fetched(), 2);
    }

    #[test]
    fn test_stops_when_cursor_exhausted() {
        let transport = transport_with(3);
        transport.set_page_size(2);

        let items: Vec<MessageRef> = list_paged(&transport, ListRequest::default(), 100)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(transport.list_calls(), 2);
    }

    #[test]
    fn test_preserves_server_order() {
        let transport = transport_with(4);
        transport.set_page_size(3);
        let expected: Vec<String> = transport.message_ids().into_iter().map(|m| m.0).collect();

        let ids: Vec<String> = list_paged(&transport, ListRequest::default(), 10)
            .map(|r| r.map(|m| m.id))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_zero_max_results_fetches_nothing() {
        let transport = transport_with(3);
        assert_eq!(list_paged(&transport, ListRequest::default(), 0).count(), 0);
        assert_eq!(transport.list_calls(), 0);
    }

    #[test]
    fn test_is_lazy() {
        let transport = transport_with(10);
        transport.set_page_size(2);

        let first: Vec<_> = list_paged(&transport, ListRequest::default(), 10).take(3).collect();
        assert_eq!(first.len(), 3);
        assert_eq!(transport.list_calls(), 2);
    }

    #[test]
    fn test_count_requests_a_single_item() {
        let transport = transport_with(9);
        assert_eq!(count_matching(&transport, ListRequest::default()).unwrap(), 9);
        assert_eq!(transport.list_calls(), 1);
        assert_eq!(transport.last_list_request().unwrap().max_results, 1);
    }
}
