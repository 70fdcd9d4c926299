/*!
Stub de l'API Mackerel pour développement sans compte réel

Démarre un serveur HTTP local (wiremock) qui répond comme l'API Mackerel v0 :
- `GET /api/v0/hosts` : recherche par service / rôle / statut
- `GET /api/v0/tsdb/latest` : dernières valeurs par hostId et nom de métrique

L'état (hôtes, valeurs, pannes simulées) est partagé et modifiable pendant le test,
toutes les requêtes reçues sont enregistrées pour les assertions.
*/

use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const HOSTS_PATH: &str = "/api/v0/hosts";
pub const LATEST_PATH: &str = "/api/v0/tsdb/latest";

#[derive(Default)]
struct StubState {
    hosts: Vec<Value>,
    /// host id -> métrique -> valeur (None = `null` côté API, pas de données)
    values: HashMap<String, HashMap<String, Option<Value>>>,
    failing_hosts: HashSet<String>,
    discovery_down: bool,
}

/// Requête HTTP reçue par le stub
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub api_key: Option<String>,
}

impl RecordedRequest {
    fn from_request(request: &Request) -> Self {
        Self {
            path: request.url.path().to_string(),
            query: request.url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect(),
            api_key: request
                .headers
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .map(String::from),
        }
    }

    /// Toutes les valeurs d'un paramètre répété (`hostId`, `role`...)
    pub fn query_values(&self, key: &str) -> Vec<String> {
        self.query
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

/// Serveur Mackerel simulé
pub struct MockMackerelApi {
    server: MockServer,
    state: Arc<Mutex<StubState>>,
}

impl MockMackerelApi {
    /// Démarre le serveur et monte les deux endpoints
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let state = Arc::new(Mutex::new(StubState::default()));

        let hosts_state = state.clone();
        Mock::given(method("GET"))
            .and(path(HOSTS_PATH))
            .respond_with(move |req: &Request| respond_hosts(&hosts_state, req))
            .mount(&server)
            .await;

        let latest_state = state.clone();
        Mock::given(method("GET"))
            .and(path(LATEST_PATH))
            .respond_with(move |req: &Request| respond_latest(&latest_state, req))
            .mount(&server)
            .await;

        log::info!("🧪 [MOCK] Mackerel API listening on {}", server.uri());
        Self { server, state }
    }

    /// URL de base à donner au client
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Ajoute un hôte (voir [`MackerelMessageBuilder::host`])
    pub fn add_host(&self, host: Value) {
        self.state.lock().unwrap().hosts.push(host);
    }

    /// Fixe la dernière valeur d'une métrique pour un hôte
    pub fn set_value(&self, host_id: &str, metric: &str, value: Value) {
        self.state
            .lock()
            .unwrap()
            .values
            .entry(host_id.to_string())
            .or_default()
            .insert(metric.to_string(), Some(value));
    }

    /// La métrique existe mais l'API renvoie `null` (pas de point récent)
    pub fn set_no_data(&self, host_id: &str, metric: &str) {
        self.state
            .lock()
            .unwrap()
            .values
            .entry(host_id.to_string())
            .or_default()
            .insert(metric.to_string(), None);
    }

    /// Toute requête `latest` contenant cet hôte répond 500
    pub fn fail_host(&self, host_id: &str) {
        self.state.lock().unwrap().failing_hosts.insert(host_id.to_string());
    }

    /// La recherche d'hôtes répond 500
    pub fn fail_discovery(&self) {
        self.state.lock().unwrap().discovery_down = true;
    }

    /// Toutes les requêtes reçues, dans l'ordre
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(RecordedRequest::from_request)
            .collect()
    }

    pub async fn host_requests(&self) -> Vec<RecordedRequest> {
        self.requests().await.into_iter().filter(|r| r.path == HOSTS_PATH).collect()
    }

    pub async fn latest_requests(&self) -> Vec<RecordedRequest> {
        self.requests().await.into_iter().filter(|r| r.path == LATEST_PATH).collect()
    }
}

fn respond_hosts(state: &Mutex<StubState>, request: &Request) -> ResponseTemplate {
    let state = state.lock().unwrap();
    if state.discovery_down {
        return ResponseTemplate::new(503).set_body_json(MackerelMessageBuilder::error_body("host search unavailable"));
    }

    let recorded = RecordedRequest::from_request(request);
    let service = recorded.query_values("service").into_iter().next();
    let roles = recorded.query_values("role");
    let statuses = recorded.query_values("status");

    let hosts: Vec<Value> = state
        .hosts
        .iter()
        .filter(|h| host_matches(h, service.as_deref(), &roles, &statuses))
        .cloned()
        .collect();

    log::info!("📥 [MOCK] hosts search -> {} hosts", hosts.len());
    ResponseTemplate::new(200).set_body_json(MackerelMessageBuilder::hosts_response(hosts))
}

fn host_matches(host: &Value, service: Option<&str>, roles: &[String], statuses: &[String]) -> bool {
    if !statuses.is_empty() {
        let status = host["status"].as_str().unwrap_or_default();
        if !statuses.iter().any(|s| s == status) {
            return false;
        }
    }

    let Some(service) = service else {
        return true;
    };
    let Some(service_roles) = host["roles"][service].as_array() else {
        return false;
    };
    roles.is_empty()
        || service_roles
            .iter()
            .filter_map(|r| r.as_str())
            .any(|r| roles.iter().any(|wanted| wanted == r))
}

fn respond_latest(state: &Mutex<StubState>, request: &Request) -> ResponseTemplate {
    let state = state.lock().unwrap();
    let recorded = RecordedRequest::from_request(request);
    let host_ids = recorded.query_values("hostId");
    let names = recorded.query_values("name");

    if let Some(bad) = host_ids.iter().find(|id| state.failing_hosts.contains(*id)) {
        return ResponseTemplate::new(500)
            .set_body_json(MackerelMessageBuilder::error_body(&format!("backend unavailable for {bad}")));
    }

    let mut tseries = serde_json::Map::new();
    for id in &host_ids {
        let Some(metrics) = state.values.get(id) else {
            continue;
        };
        let mut entries = serde_json::Map::new();
        for name in &names {
            match metrics.get(name) {
                Some(Some(value)) => {
                    entries.insert(name.clone(), MackerelMessageBuilder::latest_entry(value.clone()));
                }
                Some(None) => {
                    entries.insert(name.clone(), Value::Null);
                }
                None => {}
            }
        }
        tseries.insert(id.clone(), Value::Object(entries));
    }

    log::info!("📥 [MOCK] latest values for {} hosts", host_ids.len());
    ResponseTemplate::new(200).set_body_json(json!({ "tseries": tseries }))
}

/// Helper pour créer des payloads au format de l'API Mackerel
pub struct MackerelMessageBuilder;

impl MackerelMessageBuilder {
    /// Hôte "working" rattaché à un service avec ses rôles
    pub fn host(id: &str, name: &str, service: &str, roles: &[&str]) -> Value {
        Self::host_with_status(id, name, service, roles, "working")
    }

    pub fn host_with_status(id: &str, name: &str, service: &str, roles: &[&str], status: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "displayName": null,
            "status": status,
            "memo": "",
            "roles": { service: roles },
            "isRetired": false,
            "createdAt": chrono::Utc::now().timestamp()
        })
    }

    pub fn hosts_response(hosts: Vec<Value>) -> Value {
        json!({ "hosts": hosts })
    }

    /// Entrée `{time, value}` datée de maintenant
    pub fn latest_entry(value: Value) -> Value {
        json!({
            "time": chrono::Utc::now().timestamp(),
            "value": value
        })
    }

    pub fn error_body(message: &str) -> Value {
        json!({ "error": { "message": message } })
    }
}
