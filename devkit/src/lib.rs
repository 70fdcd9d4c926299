/*!
# Symbion DevKit - Stubs et Utilitaires pour Développement

Bibliothèque facilitant le développement de plugins Symbion avec:
- Stub HTTP de l'API Mackerel pour tests sans compte réel
- Builders de payloads au format de l'API
- Harness de test pour scénarios de pairs
*/

pub mod api_stub;
pub mod test_utils;

pub use api_stub::{MackerelMessageBuilder, MockMackerelApi, RecordedRequest};
pub use test_utils::TestHarness;
