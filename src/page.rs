use crate::cascade::{
    CascadeBinder, CascadeConfig, CascadeFields, ChangeAction, DependentField, FieldHandle, Ticket,
};
use crate::dom::{Dom, NodeId, truncate_chars};
use crate::html::parse_html;
use crate::options::{SelectOption, parse_options};
use crate::request::{Backend, FetchMocks, Request, Response};
use crate::selector::query_selector;
use crate::trace::{TraceCategory, TraceState};
use crate::{Error, Result};

/// A request issued by the cascade and not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub id: u64,
    pub request: Request,
}

impl PendingRequest {
    /// Full request URL, query included.
    pub fn url(&self) -> String {
        self.request.url()
    }
}

/// What resolving a request did to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The dependent field(s) were rebuilt from the response.
    Applied,
    /// A newer change superseded the request; the response was dropped.
    Stale,
    /// Network failure, non-2xx status or a body that is not option markup.
    /// The dependent field keeps its previous options.
    Failed(String),
}

#[derive(Debug)]
struct InFlight {
    id: u64,
    request: Request,
    ticket: Ticket,
}

/// A single page: its DOM, the optional cascade binder, and the requests
/// the binder has issued.
#[derive(Debug)]
pub struct Page {
    dom: Dom,
    binder: Option<CascadeBinder>,
    in_flight: Vec<InFlight>,
    next_request_id: u64,
    fetch_mocks: FetchMocks,
    fetch_calls: Vec<String>,
    trace_state: TraceState,
}

impl Page {
    pub fn from_html(html: &str) -> Result<Self> {
        Ok(Self {
            dom: parse_html(html)?,
            binder: None,
            in_flight: Vec::new(),
            next_request_id: 1,
            fetch_mocks: FetchMocks::new(),
            fetch_calls: Vec::new(),
            trace_state: TraceState::default(),
        })
    }

    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace_state.enabled = enabled;
    }

    pub fn set_trace_stderr(&mut self, enabled: bool) {
        self.trace_state.to_stderr = enabled;
    }

    pub fn set_trace_events(&mut self, enabled: bool) {
        self.trace_state.events = enabled;
    }

    pub fn set_trace_network(&mut self, enabled: bool) {
        self.trace_state.network = enabled;
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        self.trace_state.set_log_limit(max_entries)
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        self.trace_state.take()
    }

    /// Resolves `selector` to a select element usable in [`CascadeFields`].
    pub fn field(&self, selector: &str) -> Result<FieldHandle> {
        let node = self.select_one(selector)?;
        if !self.dom.is_tag(node, "select") {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "select".into(),
                actual: self.dom.tag_name(node).unwrap_or("non-element").to_string(),
            });
        }
        Ok(FieldHandle(node))
    }

    /// Attaches the cascade to three select fields. A page carries at most
    /// one binder, for its whole lifetime.
    pub fn bind_cascade(&mut self, fields: CascadeFields, config: CascadeConfig) -> Result<()> {
        if self.binder.is_some() {
            return Err(Error::AlreadyBound);
        }
        for handle in [fields.operation_type, fields.category, fields.subcategory] {
            if !self.dom.is_tag(handle.0, "select") {
                return Err(Error::TypeMismatch {
                    selector: self.describe_node(handle.0),
                    expected: "select".into(),
                    actual: self.dom.tag_name(handle.0).unwrap_or("non-element").to_string(),
                });
            }
        }

        let binder = CascadeBinder::new(fields, config)?;
        let line = format!(
            "bound operation_type={} category={} subcategory={}",
            self.describe_node(fields.operation_type.0),
            self.describe_node(fields.category.0),
            self.describe_node(fields.subcategory.0)
        );
        self.binder = Some(binder);
        self.trace_state.line(TraceCategory::Cascade, line);
        Ok(())
    }

    /// Binds the stock `id_operation_type` / `id_category` /
    /// `id_subcategory` fields to the reference endpoints.
    pub fn bind_reference_form(&mut self) -> Result<()> {
        self.bind_reference_form_with(CascadeConfig::default())
    }

    pub fn bind_reference_form_with(&mut self, config: CascadeConfig) -> Result<()> {
        config.validate()?;
        let fields = CascadeFields {
            operation_type: self.field(config.operation_type_selector())?,
            category: self.field(config.category_selector())?,
            subcategory: self.field(config.subcategory_selector())?,
        };
        self.bind_cascade(fields, config)
    }

    pub fn is_bound(&self) -> bool {
        self.binder.is_some()
    }

    /// Picks the option with `value` the way a user would. `input` and
    /// `change` fire only when the selection actually changes.
    pub fn select(&mut self, selector: &str, value: &str) -> Result<()> {
        let target = self.field(selector)?.0;
        if self.dom.disabled(target) {
            return Ok(());
        }

        let before = self.dom.value(target)?;
        if !self.dom.set_select_value(target, value)? {
            return Err(Error::OptionNotFound {
                selector: selector.to_string(),
                value: value.to_string(),
            });
        }
        if before != value {
            self.dispatch_event(target, "input")?;
            self.dispatch_event(target, "change")?;
        }
        Ok(())
    }

    pub fn dispatch(&mut self, selector: &str, event: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.dispatch_event(target, event)
    }

    fn dispatch_event(&mut self, target: NodeId, event: &str) -> Result<()> {
        let value = self.dom.value(target).unwrap_or_default();
        let line = format!("{event} target={} value={value:?}", self.describe_node(target));
        self.trace_state.line(TraceCategory::Event, line);

        if event != "change" {
            return Ok(());
        }
        let Some(binder) = self.binder.as_mut() else {
            return Ok(());
        };

        match binder.on_change(target, &value) {
            ChangeAction::Ignored => {}
            ChangeAction::Skipped(reason) => {
                let line = format!("skipped {}: {reason}", self.describe_node(target));
                self.trace_state.line(TraceCategory::Cascade, line);
            }
            ChangeAction::Fetch(request, ticket) => self.enqueue(request, ticket),
        }
        Ok(())
    }

    fn enqueue(&mut self, request: Request, ticket: Ticket) {
        let id = self.next_request_id;
        self.next_request_id += 1;
        let url = request.url();
        self.trace_state
            .line(TraceCategory::Network, format!("GET {url} id={id}"));
        self.fetch_calls.push(url);
        self.in_flight.push(InFlight {
            id,
            request,
            ticket,
        });
    }

    /// In-flight requests, oldest first.
    pub fn pending_requests(&self) -> Vec<PendingRequest> {
        self.in_flight
            .iter()
            .map(|flight| PendingRequest {
                id: flight.id,
                request: flight.request.clone(),
            })
            .collect()
    }

    pub fn set_fetch_mock(&mut self, url: &str, body: &str) {
        self.fetch_mocks.insert(url, body);
    }

    pub fn clear_fetch_mocks(&mut self) {
        self.fetch_mocks.clear();
    }

    /// URLs requested since the last call, in issue order.
    pub fn take_fetch_calls(&mut self) -> Vec<String> {
        std::mem::take(&mut self.fetch_calls)
    }

    pub fn respond(&mut self, id: u64, response: Response) -> Result<ResponseOutcome> {
        let flight = self.take_in_flight(id)?;
        self.resolve(flight, Ok(response))
    }

    pub fn respond_with<B: Backend + ?Sized>(
        &mut self,
        id: u64,
        backend: &B,
    ) -> Result<ResponseOutcome> {
        let flight = self.take_in_flight(id)?;
        let response = backend.handle(&flight.request);
        self.resolve(flight, Ok(response))
    }

    /// Resolves a request as a network failure.
    pub fn fail(&mut self, id: u64) -> Result<ResponseOutcome> {
        let flight = self.take_in_flight(id)?;
        self.resolve(flight, Err("network error".to_string()))
    }

    /// Resolves every pending request, oldest first, against the fetch
    /// mocks. Unmocked URLs answer 404. Returns how many were resolved.
    pub fn flush(&mut self) -> Result<usize> {
        let mocks = self.fetch_mocks.clone();
        self.flush_with(&mocks)
    }

    pub fn flush_with<B: Backend + ?Sized>(&mut self, backend: &B) -> Result<usize> {
        let drained = std::mem::take(&mut self.in_flight);
        let count = drained.len();
        for flight in drained {
            let response = backend.handle(&flight.request);
            self.resolve(flight, Ok(response))?;
        }
        Ok(count)
    }

    fn take_in_flight(&mut self, id: u64) -> Result<InFlight> {
        let index = self
            .in_flight
            .iter()
            .position(|flight| flight.id == id)
            .ok_or(Error::UnknownRequest(id))?;
        Ok(self.in_flight.remove(index))
    }

    fn resolve(
        &mut self,
        flight: InFlight,
        result: std::result::Result<Response, String>,
    ) -> Result<ResponseOutcome> {
        let InFlight {
            id,
            request,
            ticket,
        } = flight;
        let Some(binder) = self.binder.as_mut() else {
            return Ok(ResponseOutcome::Stale);
        };

        match &result {
            Ok(response) => self.trace_state.line(
                TraceCategory::Network,
                format!("done {} id={id} status={}", request.url(), response.status),
            ),
            Err(reason) => self.trace_state.line(
                TraceCategory::Network,
                format!("failed {} id={id}: {reason}", request.url()),
            ),
        }

        if !binder.is_current(ticket) {
            self.trace_state.line(
                TraceCategory::Cascade,
                format!("discarded stale response id={id}"),
            );
            return Ok(ResponseOutcome::Stale);
        }

        let options = match result {
            Err(reason) => Err(reason),
            Ok(response) if !response.is_success() => Err(format!("HTTP {}", response.status)),
            Ok(response) => parse_options(&response.body).map_err(|err| err.to_string()),
        };
        let options = match options {
            Ok(options) => options,
            Err(reason) => {
                let target = match ticket.target {
                    DependentField::Category => "category",
                    DependentField::Subcategory => "subcategory",
                };
                self.trace_state.line(
                    TraceCategory::Cascade,
                    format!("kept {target} options, request id={id} failed: {reason}"),
                );
                return Ok(ResponseOutcome::Failed(reason));
            }
        };

        for (node, options) in binder.accept_options(ticket, options) {
            self.dom.replace_select_options(node, &options)?;
            let line = format!(
                "replaced {} with {} option(s)",
                self.describe_node(node),
                options.len()
            );
            self.trace_state.line(TraceCategory::Cascade, line);
        }
        Ok(ResponseOutcome::Applied)
    }

    pub fn value(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        self.dom.value(target)
    }

    pub fn options(&self, selector: &str) -> Result<Vec<SelectOption>> {
        let target = self.field(selector)?.0;
        Ok(self.dom.select_options(target))
    }

    pub fn inner_html(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        self.dom.inner_html(target)
    }

    pub fn dump_dom(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.outer_html(target))
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        let _ = self.select_one(selector)?;
        Ok(())
    }

    pub fn assert_value(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.value(target)?;
        self.check(selector, target, expected, actual)
    }

    pub fn assert_inner_html(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.inner_html(target)?;
        self.check(selector, target, expected, actual)
    }

    pub fn assert_options(&self, selector: &str, expected: &[SelectOption]) -> Result<()> {
        let target = self.field(selector)?.0;
        let actual = self.dom.select_options(target);
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: format!("{expected:?}"),
                actual: format!("{actual:?}"),
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    fn check(&self, selector: &str, target: NodeId, expected: &str, actual: String) -> Result<()> {
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    fn select_one(&self, selector: &str) -> Result<NodeId> {
        query_selector(&self.dom, selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    fn node_snippet(&self, node_id: NodeId) -> String {
        truncate_chars(&self.dom.outer_html(node_id), 200)
    }

    fn describe_node(&self, node_id: NodeId) -> String {
        match self.dom.attr(node_id, "id") {
            Some(id) => format!("#{id}"),
            None => self.dom.tag_name(node_id).unwrap_or("#node").to_string(),
        }
    }
}
