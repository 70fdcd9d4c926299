/*!
Test Harness pour le plugin standard-score

Facilite l'écriture de tests avec:
- Setup automatique du stub Mackerel
- Déclaration d'un groupe de pairs (service / rôle / valeurs) en une ligne
- Statistiques sur les requêtes échangées
*/

use crate::api_stub::{MackerelMessageBuilder, MockMackerelApi, HOSTS_PATH, LATEST_PATH};
use serde_json::Value;
use std::collections::HashMap;

/// Harness de test : un stub Mackerel peuplé de pairs
pub struct TestHarness {
    pub api: MockMackerelApi,
    pub service: String,
    pub role: String,
    ids_by_name: HashMap<String, String>,
}

impl TestHarness {
    /// Crée un harness vide pour un couple service / rôle
    pub async fn new(service: &str, role: &str) -> Self {
        env_logger::try_init().ok(); // Init logging pour tests

        Self {
            api: MockMackerelApi::start().await,
            service: service.to_string(),
            role: role.to_string(),
            ids_by_name: HashMap::new(),
        }
    }

    /// Ajoute des pairs `(nom d'hôte, valeur)` pour une métrique
    pub fn with_peers(mut self, metric: &str, peers: &[(&str, f64)]) -> Self {
        for (name, value) in peers {
            let id = self.add_peer(name);
            self.api.set_value(&id, metric, serde_json::json!(value));
        }
        self
    }

    /// Ajoute un pair sans aucune valeur; retourne son id
    pub fn add_peer(&mut self, name: &str) -> String {
        let id = format!("id-{name}");
        self.api
            .add_host(MackerelMessageBuilder::host(&id, name, &self.service, &[self.role.as_str()]));
        self.ids_by_name.insert(name.to_string(), id.clone());
        log::info!("🖥️  Added peer {} ({})", name, id);
        id
    }

    /// Valeur brute (non numérique, null...) pour un pair existant
    pub fn set_raw_value(&self, name: &str, metric: &str, value: Value) {
        self.api.set_value(&self.peer_id(name), metric, value);
    }

    /// Id Mackerel d'un pair déclaré
    pub fn peer_id(&self, name: &str) -> String {
        self.ids_by_name
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("unknown peer: {name}"))
    }

    pub fn uri(&self) -> String {
        self.api.uri()
    }

    /// Stats sur les requêtes reçues par le stub
    pub async fn get_stats(&self) -> TestStats {
        let requests = self.api.requests().await;
        let latest: Vec<_> = requests.iter().filter(|r| r.path == LATEST_PATH).collect();

        TestStats {
            host_searches: requests.iter().filter(|r| r.path == HOSTS_PATH).count(),
            latest_batches: latest.iter().map(|r| r.query_values("hostId").len()).collect(),
        }
    }
}

#[derive(Debug)]
pub struct TestStats {
    pub host_searches: usize,
    /// Nombre de hostId par requête `latest`, dans l'ordre
    pub latest_batches: Vec<usize>,
}

impl TestStats {
    pub fn print(&self) {
        println!("📊 Test Statistics:");
        println!("  Host searches: {}", self.host_searches);
        println!("  Latest batches: {:?}", self.latest_batches);
    }
}
