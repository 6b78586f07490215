pub mod application;
pub mod naisjob;
pub mod nais_io_v1;
pub mod skatteetaten;

pub mod cnrm;
pub mod istio;
pub mod nais_io_v1_clients;
pub mod networkpolicies;
pub mod podmonitors;
