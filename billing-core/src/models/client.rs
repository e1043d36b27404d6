use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::lenient;

/// Client type (customer category) carrying the credit limit for its clients.
///
/// Maps to the billing API's `/tipo_clientes/` resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientType {
    /// Unique identifier of the client type
    pub id_tipcli: i64,

    /// Display name (unique remotely)
    pub nombre: String,

    /// Maximum outstanding credit allowed for clients of this type.
    /// Zero means credit sales are not allowed.
    #[serde(deserialize_with = "lenient::decimal::deserialize")]
    pub monto_maximo: Decimal,
}

/// Client model mirroring the billing API's `/clientes/` resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id_cliente: i64,

    /// Foreign key to [`ClientType::id_tipcli`]
    pub tipo_cliente: i64,

    pub nombre: String,
    pub apellido: String,
    pub direccion: String,
    pub telefono: String,
    pub correo_electronico: String,

    /// `Activo` / `Inactivo`
    pub estado: String,

    /// `Cedula`, `RUC`, `Pasaporte`...
    pub tipo_identificacion: String,
    pub numero_identificacion: String,

    /// Birth date as sent by the API (`YYYY-MM-DD`)
    pub fecha_nacimiento: String,

    /// Denormalized client type name, filled by the API on reads
    #[serde(default)]
    pub nombre_tipo_cliente: Option<String>,
}

impl Client {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.nombre, self.apellido)
    }

    pub fn is_active(&self) -> bool {
        self.estado.eq_ignore_ascii_case("activo")
    }

    /// Resolves this client's type from a list of client types.
    ///
    /// Matches on the type id first; falls back to a case-insensitive match
    /// on the denormalized type name.
    pub fn resolve_type<'a>(&self, types: &'a [ClientType]) -> Option<&'a ClientType> {
        types
            .iter()
            .find(|t| t.id_tipcli == self.tipo_cliente)
            .or_else(|| {
                let name = self.nombre_tipo_cliente.as_deref()?;
                types.iter().find(|t| t.nombre.to_lowercase() == name.to_lowercase())
            })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_resolve_type_by_id() {
        let types = vec![client_type(1, "Minorista", 100), client_type(2, "Mayorista", 250)];
        let c = client(10, 2);
        assert_eq!(c.resolve_type(&types).map(|t| t.id_tipcli), Some(2));
    }

    #[test]
    fn test_resolve_type_falls_back_to_name() {
        let types = vec![client_type(1, "Minorista", 100), client_type(2, "Mayorista", 250)];
        let mut c = client(10, 99);
        c.nombre_tipo_cliente = Some("MAYORISTA".to_string());
        assert_eq!(c.resolve_type(&types).map(|t| t.id_tipcli), Some(2));

        c.nombre_tipo_cliente = None;
        assert!(c.resolve_type(&types).is_none());
    }

    #[test]
    fn test_client_type_limit_from_string() {
        let t: ClientType =
            serde_json::from_str(r#"{"id_tipcli": 3, "nombre": "VIP", "monto_maximo": "1500.00"}"#)
                .unwrap();
        assert_eq!(t.monto_maximo, Decimal::new(150000, 2));
    }
}
