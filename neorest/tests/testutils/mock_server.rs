// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory stand-in for the Neo4j REST interface
//!
//! Implements [`Transport`] and answers discovery, batch, transactional and
//! legacy cypher requests against a small in-memory graph. The Cypher
//! support is limited to the statement forms the tests use:
//!
//! - `CREATE (n:Label) RETURN n` / `CREATE (n:Label $props) RETURN n`
//! - `MATCH (n:Label) RETURN n`
//! - `RETURN <int> AS <name>`

use async_trait::async_trait;
use neorest::{Error, HttpRequest, HttpResponse, Method, Result, Transport};
use parking_lot::Mutex;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const URL: &str = "http://localhost:7474";
pub const ROOT: &str = "http://localhost:7474/db/data";

pub type TaskHook = Box<dyn Fn(&Value) -> Option<(u16, Value)> + Send + Sync>;

pub fn discovery() -> Value {
    let link = |path: &str| Value::String(format!("{}{}", ROOT, path));
    json!({
        "extensions": {},
        "node": link("/node"),
        "relationship": link("/relationship"),
        "node_index": link("/index/node"),
        "relationship_index": link("/index/relationship"),
        "extensions_info": link("/ext"),
        "relationship_types": link("/relationship/types"),
        "batch": link("/batch"),
        "cypher": link("/cypher"),
        "indexes": link("/schema/index"),
        "constraints": link("/schema/constraint"),
        "transaction": link("/transaction"),
        "node_labels": link("/labels"),
        "neo4j_version": "3.5.14"
    })
}

pub fn expires(renewals: u32) -> String {
    format!("Mon, 19 Oct 2026 12:{:02}:00 +0000", renewals % 60)
}

pub fn node_url(id: u64) -> String {
    format!("{}/node/{}", ROOT, id)
}

pub fn relationship_url(id: u64) -> String {
    format!("{}/relationship/{}", ROOT, id)
}

#[derive(Debug, Clone)]
struct NodeRecord {
    labels: Vec<String>,
    properties: Map<String, Value>,
}

#[derive(Debug, Clone)]
struct RelRecord {
    start: u64,
    end: u64,
    rel_type: String,
    properties: Map<String, Value>,
}

/// REST node payload
pub fn node_payload(id: u64, labels: &[String], properties: &Map<String, Value>) -> Value {
    let base = node_url(id);
    json!({
        "self": base,
        "properties": format!("{}/properties", base),
        "property": format!("{}/properties/{{key}}", base),
        "labels": format!("{}/labels", base),
        "create_relationship": format!("{}/relationships", base),
        "all_relationships": format!("{}/relationships/all", base),
        "traverse": format!("{}/traverse/{{returnType}}", base),
        "data": properties,
        "metadata": {"id": id, "labels": labels}
    })
}

/// REST relationship payload
pub fn relationship_payload(id: u64, start: u64, end: u64, rel_type: &str, properties: &Map<String, Value>) -> Value {
    let base = relationship_url(id);
    json!({
        "self": base,
        "start": node_url(start),
        "end": node_url(end),
        "type": rel_type,
        "properties": format!("{}/properties", base),
        "property": format!("{}/properties/{{key}}", base),
        "data": properties,
        "metadata": {"id": id, "type": rel_type}
    })
}

#[derive(Default)]
struct ServerState {
    nodes: BTreeMap<u64, NodeRecord>,
    relationships: BTreeMap<u64, RelRecord>,
    next_id: u64,
    transactions: HashMap<u64, Vec<(u64, NodeRecord)>>,
    renewals: HashMap<u64, u32>,
    next_tx: u64,
    indexes: Vec<Value>,
    constraints: Vec<Value>,
}

impl ServerState {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn node_json(&self, id: u64) -> Option<Value> {
        self.nodes
            .get(&id)
            .map(|node| node_payload(id, &node.labels, &node.properties))
    }

    fn relationship_json(&self, id: u64) -> Option<Value> {
        self.relationships
            .get(&id)
            .map(|rel| relationship_payload(id, rel.start, rel.end, &rel.rel_type, &rel.properties))
    }
}

enum Cell {
    Node(u64, NodeRecord),
    Value(Value),
}

/// Stateful mock of the REST service
pub struct MockServer {
    state: Mutex<ServerState>,
    requests: Mutex<Vec<HttpRequest>>,
    hook: Mutex<Option<TaskHook>>,
    omitted: Mutex<HashSet<String>>,
    discovery: Mutex<(u16, Value)>,
    reverse: AtomicBool,
    fail_batches: AtomicBool,
    offline: AtomicBool,
}

impl MockServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ServerState::default()),
            requests: Mutex::new(Vec::new()),
            hook: Mutex::new(None),
            omitted: Mutex::new(HashSet::new()),
            discovery: Mutex::new((200, discovery())),
            reverse: AtomicBool::new(false),
            fail_batches: AtomicBool::new(false),
            offline: AtomicBool::new(false),
        })
    }

    /// Answers batch tasks before the built-in routes; `None` falls through
    pub fn set_hook(&self, hook: impl Fn(&Value) -> Option<(u16, Value)> + Send + Sync + 'static) {
        *self.hook.lock() = Some(Box::new(hook));
    }

    /// Returns batch entries in reverse order
    pub fn reverse_batches(&self, on: bool) {
        self.reverse.store(on, Ordering::SeqCst);
    }

    /// Answers every batch request with a 500
    pub fn fail_batches(&self, on: bool) {
        self.fail_batches.store(on, Ordering::SeqCst);
    }

    /// Leaves tasks targeting `to` out of batch responses
    pub fn omit_target(&self, to: &str) {
        self.omitted.lock().insert(to.to_string());
    }

    pub fn set_discovery(&self, status: u16, body: Value) {
        *self.discovery.lock() = (status, body);
    }

    /// Every call fails at the transport level
    pub fn set_offline(&self, on: bool) {
        self.offline.store(on, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Task lists of every batch request, in arrival order
    pub fn batches(&self) -> Vec<Vec<Value>> {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.url == format!("{}/batch", ROOT))
            .filter_map(|request| request.body.as_ref().and_then(Value::as_array).cloned())
            .collect()
    }

    /// `METHOD to` of every batched task, in submission order
    pub fn task_log(&self) -> Vec<String> {
        self.batches()
            .iter()
            .flatten()
            .map(|task| {
                format!(
                    "{} {}",
                    task["method"].as_str().unwrap_or_default(),
                    task["to"].as_str().unwrap_or_default()
                )
            })
            .collect()
    }

    pub fn seed_node(&self, labels: &[&str], properties: Value) -> u64 {
        let mut state = self.state.lock();
        let id = state.allocate();
        let record = NodeRecord {
            labels: labels.iter().map(|l| l.to_string()).collect(),
            properties: properties.as_object().cloned().unwrap_or_default(),
        };
        state.nodes.insert(id, record);
        id
    }

    pub fn seed_relationship(&self, start: u64, end: u64, rel_type: &str, properties: Value) -> u64 {
        let mut state = self.state.lock();
        let id = state.allocate();
        state.relationships.insert(
            id,
            RelRecord {
                start,
                end,
                rel_type: rel_type.to_string(),
                properties: properties.as_object().cloned().unwrap_or_default(),
            },
        );
        id
    }

    /// Stored node as `{labels, properties}`
    pub fn node(&self, id: u64) -> Option<Value> {
        self.state
            .lock()
            .nodes
            .get(&id)
            .map(|node| json!({"labels": node.labels, "properties": node.properties}))
    }

    /// Stored relationship as `{start, end, type, properties}`
    pub fn relationship(&self, id: u64) -> Option<Value> {
        self.state.lock().relationships.get(&id).map(|rel| {
            json!({"start": rel.start, "end": rel.end, "type": rel.rel_type, "properties": rel.properties})
        })
    }

    pub fn node_count(&self) -> usize {
        self.state.lock().nodes.len()
    }

    pub fn open_transactions(&self) -> usize {
        self.state.lock().transactions.len()
    }

    fn route(&self, request: &HttpRequest) -> (u16, Value) {
        let path = request.url.strip_prefix(ROOT).unwrap_or(&request.url);
        let tx_path = Regex::new(r"^/transaction/(\d+)(/commit)?$").expect("valid regex");

        match (request.method, path) {
            (Method::Get, "") | (Method::Get, "/") => self.discovery.lock().clone(),
            (Method::Post, "/batch") => self.batch(request.body.as_ref()),
            (Method::Get, "/relationship/types") => {
                let state = self.state.lock();
                let mut types: Vec<String> =
                    state.relationships.values().map(|rel| rel.rel_type.clone()).collect();
                types.sort();
                types.dedup();
                (200, json!(types))
            }
            (Method::Post, "/transaction") => self.open_transaction(request.body.as_ref()),
            (method, path) => match tx_path.captures(path) {
                Some(captures) => {
                    let id: u64 = captures[1].parse().unwrap_or_default();
                    let commit = captures.get(2).is_some();
                    match (method, commit) {
                        (Method::Post, false) => self.execute_transaction(id, request.body.as_ref()),
                        (Method::Post, true) => self.commit_transaction(Some(id), request.body.as_ref()),
                        (Method::Delete, false) => self.rollback_transaction(id),
                        _ => not_found(path),
                    }
                }
                None => not_found(path),
            },
        }
    }

    fn batch(&self, body: Option<&Value>) -> (u16, Value) {
        if self.fail_batches.load(Ordering::SeqCst) {
            return (500, json!({"message": "batch failed"}));
        }
        let tasks = body.and_then(Value::as_array).cloned().unwrap_or_default();
        let omitted = self.omitted.lock().clone();

        let mut entries = Vec::new();
        for task in &tasks {
            let to = task["to"].as_str().unwrap_or_default().to_string();
            if omitted.contains(&to) {
                continue;
            }
            let hooked = self.hook.lock().as_ref().and_then(|hook| hook(task));
            let (status, body) = match hooked {
                Some(answer) => answer,
                None => {
                    let method = task["method"].as_str().unwrap_or_default();
                    self.rest(method, &to, task.get("body"))
                }
            };
            entries.push(json!({"id": task["id"], "from": to, "status": status, "body": body}));
        }
        if self.reverse.load(Ordering::SeqCst) {
            entries.reverse();
        }
        (200, Value::Array(entries))
    }

    fn rest(&self, method: &str, to: &str, body: Option<&Value>) -> (u16, Value) {
        let path = to.strip_prefix(ROOT).unwrap_or(to);
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let body = body.cloned().unwrap_or(Value::Null);
        let mut state = self.state.lock();

        match (method, segments.as_slice()) {
            ("POST", ["node"]) => {
                let node_id = state.allocate();
                let record = NodeRecord {
                    labels: Vec::new(),
                    properties: body.as_object().cloned().unwrap_or_default(),
                };
                state.nodes.insert(node_id, record);
                (201, state.node_json(node_id).unwrap_or_default())
            }
            ("GET", ["node", node]) => match parse_id(node).and_then(|n| state.node_json(n)) {
                Some(payload) => (200, payload),
                None => node_missing(node),
            },
            ("DELETE", ["node", node]) => match parse_id(node).and_then(|n| state.nodes.remove(&n)) {
                Some(_) => (204, Value::Null),
                None => node_missing(node),
            },
            ("PUT", ["node", node, "properties", key]) => {
                with_node(&mut state, node, |record| {
                    record.properties.insert(key.to_string(), body.clone());
                })
            }
            ("DELETE", ["node", node, "properties", key]) => with_node(&mut state, node, |record| {
                record.properties.remove(*key);
            }),
            ("PUT", ["node", node, "properties"]) => with_node(&mut state, node, |record| {
                record.properties = body.as_object().cloned().unwrap_or_default();
            }),
            ("DELETE", ["node", node, "properties"]) => with_node(&mut state, node, |record| {
                record.properties.clear();
            }),
            ("POST", ["node", node, "labels"]) => with_node(&mut state, node, |record| {
                for label in labels_of(&body) {
                    if !record.labels.contains(&label) {
                        record.labels.push(label);
                    }
                }
            }),
            ("PUT", ["node", node, "labels"]) => with_node(&mut state, node, |record| {
                record.labels = labels_of(&body);
            }),
            ("DELETE", ["node", node, "labels", label]) => with_node(&mut state, node, |record| {
                record.labels.retain(|existing| existing != label);
            }),
            ("POST", ["node", node, "relationships"]) => {
                let start = parse_id(node).filter(|n| state.nodes.contains_key(n));
                let end = body["to"]
                    .as_str()
                    .and_then(|url| url.rsplit('/').next())
                    .and_then(|segment| segment.parse::<u64>().ok())
                    .filter(|n| state.nodes.contains_key(n));
                match (start, end, body["type"].as_str()) {
                    (Some(start), Some(end), Some(rel_type)) => {
                        let rel_id = state.allocate();
                        state.relationships.insert(
                            rel_id,
                            RelRecord {
                                start,
                                end,
                                rel_type: rel_type.to_string(),
                                properties: body["data"].as_object().cloned().unwrap_or_default(),
                            },
                        );
                        (201, state.relationship_json(rel_id).unwrap_or_default())
                    }
                    _ => (
                        400,
                        json!({"exception": "StartOrEndNodeNotFoundException", "message": "bad nodes"}),
                    ),
                }
            }
            ("GET", ["node", node, "relationships", direction, rest @ ..]) => {
                let types = rest.first().map(|t| t.split('&').map(str::to_string).collect::<Vec<String>>());
                match parse_id(node) {
                    Some(n) if state.nodes.contains_key(&n) => {
                        let ids = adjacent(&state, n, direction, types.as_ref());
                        let payloads: Vec<Value> =
                            ids.iter().filter_map(|r| state.relationship_json(*r)).collect();
                        (200, Value::Array(payloads))
                    }
                    _ => node_missing(node),
                }
            }
            ("GET", ["node", node, "degree", direction, rest @ ..]) => {
                let types = rest.first().map(|t| t.split('&').map(str::to_string).collect::<Vec<String>>());
                match parse_id(node) {
                    Some(n) if state.nodes.contains_key(&n) => {
                        (200, json!(adjacent(&state, n, direction, types.as_ref()).len()))
                    }
                    _ => node_missing(node),
                }
            }
            ("POST", ["node", node, "paths"]) => match parse_id(node) {
                Some(n) => (200, shortest_paths(&state, n, &body)),
                None => node_missing(node),
            },
            ("GET", ["relationship", rel]) => match parse_id(rel).and_then(|r| state.relationship_json(r)) {
                Some(payload) => (200, payload),
                None => (
                    404,
                    json!({"exception": "RelationshipNotFoundException", "message": format!("Relationship {} not found", rel)}),
                ),
            },
            ("DELETE", ["relationship", rel]) => match parse_id(rel).and_then(|r| state.relationships.remove(&r)) {
                Some(_) => (204, Value::Null),
                None => not_found(to),
            },
            ("PUT", ["relationship", rel, "properties", key]) => with_relationship(&mut state, rel, |record| {
                record.properties.insert(key.to_string(), body.clone());
            }),
            ("DELETE", ["relationship", rel, "properties", key]) => {
                with_relationship(&mut state, rel, |record| {
                    record.properties.remove(*key);
                })
            }
            ("PUT", ["relationship", rel, "properties"]) => with_relationship(&mut state, rel, |record| {
                record.properties = body.as_object().cloned().unwrap_or_default();
            }),
            ("DELETE", ["relationship", rel, "properties"]) => with_relationship(&mut state, rel, |record| {
                record.properties.clear();
            }),
            ("POST", ["transaction", "commit"]) => {
                drop(state);
                self.commit_transaction(None, Some(&body))
            }
            ("POST", ["cypher"]) => {
                let statement = body["query"].as_str().unwrap_or_default();
                match run_statement(&mut state, None, statement, &body["params"]) {
                    Ok((columns, rows)) => {
                        let data: Vec<Value> = rows
                            .iter()
                            .map(|row| Value::Array(row.iter().map(rest_cell).collect()))
                            .collect();
                        (200, json!({"columns": columns, "data": data}))
                    }
                    Err(message) => (
                        400,
                        json!({"exception": "SyntaxException", "message": message}),
                    ),
                }
            }
            ("GET", ["propertykeys"]) => {
                let mut keys: Vec<String> = state
                    .nodes
                    .values()
                    .flat_map(|node| node.properties.keys().cloned())
                    .chain(
                        state
                            .relationships
                            .values()
                            .flat_map(|rel| rel.properties.keys().cloned()),
                    )
                    .collect();
                keys.sort();
                keys.dedup();
                (200, json!(keys))
            }
            ("GET", ["labels"]) => {
                let mut labels: Vec<String> =
                    state.nodes.values().flat_map(|node| node.labels.clone()).collect();
                labels.sort();
                labels.dedup();
                (200, json!(labels))
            }
            ("POST", ["schema", "index", label]) => {
                let index = json!({"label": label, "property_keys": body["property_keys"]});
                state.indexes.push(index.clone());
                (200, index)
            }
            ("GET", ["schema", "index", label]) => {
                if *label == "Broken" {
                    return (500, json!({"exception": "IndexLookupException", "message": "broken"}));
                }
                let indexes: Vec<Value> = state
                    .indexes
                    .iter()
                    .filter(|index| index["label"] == *label)
                    .cloned()
                    .collect();
                (200, Value::Array(indexes))
            }
            ("DELETE", ["schema", "index", label, key]) => {
                state
                    .indexes
                    .retain(|index| !(index["label"] == *label && index["property_keys"][0] == *key));
                (204, Value::Null)
            }
            ("POST", ["schema", "constraint", label, kind]) => {
                let constraint = json!({"label": label, "type": kind.to_uppercase(), "property_keys": body["property_keys"]});
                state.constraints.push(constraint.clone());
                (200, constraint)
            }
            ("GET", ["schema", "constraint", filters @ ..]) => {
                let label = filters.first().copied();
                let constraints: Vec<Value> = state
                    .constraints
                    .iter()
                    .filter(|c| label.map_or(true, |label| c["label"] == label))
                    .cloned()
                    .collect();
                (200, Value::Array(constraints))
            }
            ("DELETE", ["schema", "constraint", label, _kind, key]) => {
                state
                    .constraints
                    .retain(|c| !(c["label"] == *label && c["property_keys"][0] == *key));
                (204, Value::Null)
            }
            ("POST", ["index", service, label]) => (
                201,
                json!({"indexed": format!("{}/index/{}/{}/{}/{}", ROOT, service, label, body["key"].as_str().unwrap_or_default(), body["value"].as_str().unwrap_or_default()), "uri": body["uri"]}),
            ),
            _ => not_found(to),
        }
    }

    fn open_transaction(&self, body: Option<&Value>) -> (u16, Value) {
        let mut state = self.state.lock();
        state.next_tx += 1;
        let tx = state.next_tx;
        state.transactions.insert(tx, Vec::new());
        state.renewals.insert(tx, 0);

        let (results, errors) = run_statements(&mut state, Some(tx), body);
        if !errors.is_empty() {
            state.transactions.remove(&tx);
            return (200, json!({"results": results, "errors": errors}));
        }
        (
            201,
            json!({
                "commit": format!("{}/transaction/{}/commit", ROOT, tx),
                "results": results,
                "transaction": {"expires": expires(0)},
                "errors": []
            }),
        )
    }

    fn execute_transaction(&self, tx: u64, body: Option<&Value>) -> (u16, Value) {
        let mut state = self.state.lock();
        if !state.transactions.contains_key(&tx) {
            return tx_not_found(tx);
        }
        let renewals = {
            let counter = state.renewals.entry(tx).or_insert(0);
            *counter += 1;
            *counter
        };
        let (results, errors) = run_statements(&mut state, Some(tx), body);
        if !errors.is_empty() {
            // a failing statement rolls the whole transaction back
            state.transactions.remove(&tx);
            state.renewals.remove(&tx);
            return (200, json!({"results": results, "errors": errors}));
        }
        (
            200,
            json!({
                "commit": format!("{}/transaction/{}/commit", ROOT, tx),
                "results": results,
                "transaction": {"expires": expires(renewals)},
                "errors": errors
            }),
        )
    }

    fn commit_transaction(&self, tx: Option<u64>, body: Option<&Value>) -> (u16, Value) {
        let mut state = self.state.lock();
        if let Some(tx) = tx {
            if !state.transactions.contains_key(&tx) {
                return tx_not_found(tx);
            }
        }
        let (results, errors) = run_statements(&mut state, tx, body);
        if let Some(tx) = tx {
            let pending = state.transactions.remove(&tx).unwrap_or_default();
            state.renewals.remove(&tx);
            if errors.is_empty() {
                for (id, record) in pending {
                    state.nodes.insert(id, record);
                }
            }
        }
        (200, json!({"results": results, "errors": errors}))
    }

    fn rollback_transaction(&self, tx: u64) -> (u16, Value) {
        let mut state = self.state.lock();
        match state.transactions.remove(&tx) {
            Some(_) => {
                state.renewals.remove(&tx);
                (200, json!({"results": [], "errors": []}))
            }
            None => tx_not_found(tx),
        }
    }
}

#[async_trait]
impl Transport for MockServer {
    async fn call(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().push(request.clone());
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Transport("connection refused".into()));
        }
        let (status, body) = self.route(&request);
        let text = if body.is_null() { String::new() } else { body.to_string() };
        Ok(HttpResponse::new(status, text))
    }
}

fn parse_id(segment: &str) -> Option<u64> {
    segment.parse().ok()
}

fn not_found(path: &str) -> (u16, Value) {
    (404, json!({"exception": "NotFoundException", "message": format!("No route for {}", path)}))
}

fn node_missing(node: &str) -> (u16, Value) {
    (
        404,
        json!({"exception": "NodeNotFoundException", "message": format!("Cannot find node with id [{}] in database.", node)}),
    )
}

fn tx_not_found(tx: u64) -> (u16, Value) {
    (
        404,
        json!({"results": [], "errors": [{"code": "Neo.ClientError.Transaction.TransactionNotFound", "message": format!("Unrecognized transaction id {}", tx)}]}),
    )
}

fn with_node(state: &mut ServerState, node: &str, f: impl FnOnce(&mut NodeRecord)) -> (u16, Value) {
    match node.parse::<u64>().ok().and_then(|id| state.nodes.get_mut(&id)) {
        Some(record) => {
            f(record);
            (204, Value::Null)
        }
        None => node_missing(node),
    }
}

fn with_relationship(state: &mut ServerState, rel: &str, f: impl FnOnce(&mut RelRecord)) -> (u16, Value) {
    match rel.parse::<u64>().ok().and_then(|id| state.relationships.get_mut(&id)) {
        Some(record) => {
            f(record);
            (204, Value::Null)
        }
        None => not_found(rel),
    }
}

fn labels_of(body: &Value) -> Vec<String> {
    match body {
        Value::String(label) => vec![label.clone()],
        Value::Array(labels) => labels
            .iter()
            .filter_map(|l| l.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn adjacent(state: &ServerState, node: u64, direction: &str, types: Option<&Vec<String>>) -> Vec<u64> {
    state
        .relationships
        .iter()
        .filter(|(_, rel)| match direction {
            "out" => rel.start == node,
            "in" => rel.end == node,
            _ => rel.start == node || rel.end == node,
        })
        .filter(|(_, rel)| types.map_or(true, |types| types.contains(&rel.rel_type)))
        .map(|(id, _)| *id)
        .collect()
}

/// Breadth-first shortest path following `relationships.type` in `relationships.direction`
fn shortest_paths(state: &ServerState, from: u64, settings: &Value) -> Value {
    let Some(target) = settings["to"]
        .as_str()
        .and_then(|url| url.rsplit('/').next())
        .and_then(|segment| segment.parse::<u64>().ok())
    else {
        return json!([]);
    };
    let rel_type = settings["relationships"]["type"].as_str().unwrap_or_default();
    let outgoing = settings["relationships"]["direction"].as_str() != Some("in");
    let max_depth = settings["max_depth"].as_u64().unwrap_or(u64::MAX);

    let mut queue = VecDeque::from([(from, Vec::<u64>::new(), vec![from])]);
    let mut seen = HashSet::from([from]);
    while let Some((node, rels, nodes)) = queue.pop_front() {
        if node == target {
            let length = rels.len();
            return json!([{
                "start": node_url(from),
                "end": node_url(target),
                "nodes": nodes.iter().map(|n| node_url(*n)).collect::<Vec<_>>(),
                "relationships": rels.iter().map(|r| relationship_url(*r)).collect::<Vec<_>>(),
                "length": length,
                "directions": vec![if outgoing { "->" } else { "<-" }; length]
            }]);
        }
        if rels.len() as u64 >= max_depth {
            continue;
        }
        for (id, rel) in &state.relationships {
            if rel.rel_type != rel_type {
                continue;
            }
            let next = match (outgoing, rel.start == node, rel.end == node) {
                (true, true, _) => rel.end,
                (false, _, true) => rel.start,
                _ => continue,
            };
            if seen.insert(next) {
                let mut rels = rels.clone();
                rels.push(*id);
                let mut nodes = nodes.clone();
                nodes.push(next);
                queue.push_back((next, rels, nodes));
            }
        }
    }
    json!([])
}

fn rest_cell(cell: &Cell) -> Value {
    match cell {
        Cell::Node(id, record) => node_payload(*id, &record.labels, &record.properties),
        Cell::Value(value) => value.clone(),
    }
}

fn row_cell(cell: &Cell) -> Value {
    match cell {
        Cell::Node(_, record) => Value::Object(record.properties.clone()),
        Cell::Value(value) => value.clone(),
    }
}

fn graph_node(cell: &Cell) -> Option<Value> {
    match cell {
        Cell::Node(id, record) => Some(json!({
            "id": id.to_string(),
            "labels": record.labels,
            "properties": record.properties
        })),
        Cell::Value(_) => None,
    }
}

/// Runs the `statements` of a transactional request
fn run_statements(state: &mut ServerState, tx: Option<u64>, body: Option<&Value>) -> (Vec<Value>, Vec<Value>) {
    let statements = body
        .and_then(|body| body["statements"].as_array())
        .cloned()
        .unwrap_or_default();

    let mut results = Vec::new();
    let mut errors = Vec::new();
    for statement in &statements {
        let text = statement["statement"].as_str().unwrap_or_default();
        let contents: Vec<String> = statement["resultDataContents"]
            .as_array()
            .map(|c| c.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_else(|| vec!["REST".to_string()]);

        match run_statement(state, tx, text, &statement["parameters"]) {
            Ok((columns, rows)) => {
                let data: Vec<Value> = rows
                    .iter()
                    .map(|row| {
                        let mut datum = Map::new();
                        for content in &contents {
                            match content.as_str() {
                                "REST" => {
                                    datum.insert("rest".into(), row.iter().map(rest_cell).collect());
                                }
                                "row" => {
                                    datum.insert("row".into(), row.iter().map(row_cell).collect());
                                }
                                "graph" => {
                                    let nodes: Vec<Value> = row.iter().filter_map(graph_node).collect();
                                    datum.insert("graph".into(), json!({"nodes": nodes, "relationships": []}));
                                }
                                _ => {}
                            }
                        }
                        Value::Object(datum)
                    })
                    .collect();
                results.push(json!({"columns": columns, "data": data}));
            }
            Err(message) => {
                errors.push(json!({"code": "Neo.ClientError.Statement.SyntaxError", "message": message}));
                break;
            }
        }
    }
    (results, errors)
}

type StatementResult = std::result::Result<(Vec<String>, Vec<Vec<Cell>>), String>;

fn run_statement(state: &mut ServerState, tx: Option<u64>, statement: &str, params: &Value) -> StatementResult {
    let create = Regex::new(r"^CREATE \(n:(\w+)(?:\s*\$(\w+))?\) RETURN n$").expect("valid regex");
    let find = Regex::new(r"^MATCH \(n:(\w+)\) RETURN n$").expect("valid regex");
    let scalar = Regex::new(r"^RETURN (-?\d+) AS (\w+)$").expect("valid regex");
    let statement = statement.trim();

    if let Some(captures) = create.captures(statement) {
        let properties = captures
            .get(2)
            .and_then(|param| params[param.as_str()].as_object().cloned())
            .unwrap_or_default();
        let record = NodeRecord {
            labels: vec![captures[1].to_string()],
            properties,
        };
        let id = state.allocate();
        match tx.and_then(|tx| state.transactions.get_mut(&tx)) {
            Some(pending) => pending.push((id, record.clone())),
            None => {
                state.nodes.insert(id, record.clone());
            }
        }
        return Ok((vec!["n".into()], vec![vec![Cell::Node(id, record)]]));
    }

    if let Some(captures) = find.captures(statement) {
        let label = captures[1].to_string();
        let pending = tx
            .and_then(|tx| state.transactions.get(&tx))
            .cloned()
            .unwrap_or_default();
        let rows = state
            .nodes
            .iter()
            .map(|(id, record)| (*id, record.clone()))
            .chain(pending)
            .filter(|(_, record)| record.labels.contains(&label))
            .map(|(id, record)| vec![Cell::Node(id, record)])
            .collect();
        return Ok((vec!["n".into()], rows));
    }

    if let Some(captures) = scalar.captures(statement) {
        let value: i64 = captures[1].parse().map_err(|_| "bad integer".to_string())?;
        return Ok((vec![captures[2].to_string()], vec![vec![Cell::Value(json!(value))]]));
    }

    Err(format!("Invalid input: {}", statement))
}
