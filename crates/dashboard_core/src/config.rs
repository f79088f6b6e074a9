use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ExecuteRequest, StatusUpdate, SystemStatusKind};

/// Declarative ETL configuration document, as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtlConfig {
    #[serde(rename = "versao", default)]
    pub version: String,
    #[serde(rename = "ultimaModificacao", default)]
    pub last_modified: String,
    #[serde(rename = "periodo", default)]
    pub period: Period,
    #[serde(rename = "sistemas", default)]
    pub systems: BTreeMap<String, SystemConfig>,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            version: "2.0".to_string(),
            last_modified: String::new(),
            period: Period::default(),
            systems: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    #[serde(rename = "dataInicial", default)]
    pub start_date: Option<String>,
    #[serde(rename = "dataFinal", default)]
    pub end_date: Option<String>,
    #[serde(rename = "usarD1Anbima", default = "default_true")]
    pub use_d1_anbima: bool,
}

impl Default for Period {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            use_d1_anbima: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Fund {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "sigla", default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(rename = "tipo", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,
    #[serde(rename = "ativo", default)]
    pub active: bool,
}

/// One external system (MAPS, FIDC, ...) with its activation, options and live status.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "nome", default)]
    pub name: String,
    #[serde(rename = "descricao", default)]
    pub description: String,
    #[serde(rename = "icone", default)]
    pub icon: String,
    #[serde(rename = "ativo", default)]
    pub active: bool,
    #[serde(rename = "ordem", default)]
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(rename = "funcao", default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(rename = "opcoes", default, skip_serializing_if = "Option::is_none")]
    pub options: Option<BTreeMap<String, bool>>,
    #[serde(rename = "fundos", default, skip_serializing_if = "Option::is_none")]
    pub funds: Option<Vec<Fund>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SystemStatusKind>,
    #[serde(rename = "progresso", default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(rename = "mensagem", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl EtlConfig {
    /// Systems sorted by display order, then id.
    pub fn ordered_systems(&self) -> Vec<(&String, &SystemConfig)> {
        let mut systems: Vec<_> = self.systems.iter().collect();
        systems.sort_by(|(a_id, a), (b_id, b)| a.order.cmp(&b.order).then_with(|| a_id.cmp(b_id)));
        systems
    }

    pub fn active_system_ids(&self) -> Vec<String> {
        self.ordered_systems()
            .into_iter()
            .filter(|(_, system)| system.active)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.systems.values().filter(|system| system.active).count()
    }

    pub(crate) fn set_active(&mut self, system_id: &str, active: bool) -> bool {
        match self.systems.get_mut(system_id) {
            Some(system) => {
                system.active = active;
                true
            }
            None => false,
        }
    }

    /// Only systems that already expose an options map can have an option toggled.
    pub(crate) fn set_option(&mut self, system_id: &str, option: &str, value: bool) -> bool {
        match self
            .systems
            .get_mut(system_id)
            .and_then(|system| system.options.as_mut())
        {
            Some(options) => {
                options.insert(option.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Merge-patch a live status update; unknown systems are left alone.
    pub(crate) fn apply_status(&mut self, system_id: &str, update: &StatusUpdate) -> bool {
        match self.systems.get_mut(system_id) {
            Some(system) => {
                system.status = Some(update.status);
                system.progress = Some(update.progress.min(100));
                if let Some(message) = &update.message {
                    system.message = Some(message.clone());
                }
                true
            }
            None => false,
        }
    }

    pub(crate) fn execute_request(&self, clear_dirs: bool) -> ExecuteRequest {
        let opcoes = self
            .systems
            .iter()
            .filter_map(|(id, system)| system.options.as_ref().map(|opts| (id.clone(), opts.clone())))
            .collect();
        ExecuteRequest {
            sistemas: self.active_system_ids(),
            limpar: clear_dirs,
            opcoes,
            data_inicial: self.period.start_date.clone(),
            data_final: self.period.end_date.clone(),
        }
    }
}
