use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{create_router, AppState};
use crate::auth::AuthContext;
use crate::config::Config;
use crate::permissions::fixtures::{full_access, grant};
use crate::permissions::Permissions;

struct TestApp {
    server: MockServer,
    state: AppState,
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let state = AppState::new(Config::for_tests(&server.uri())).unwrap();
        let router = create_router(state.clone());
        Self { server, state, router }
    }

    fn token_for(&self, username: &str, permissions: Permissions) -> String {
        let context = AuthContext {
            username: username.to_string(),
            user_id: Some(1),
            module: "FAC".to_string(),
            permissions,
        };
        self.state.sessions.issue(&context).unwrap()
    }

    fn token(&self) -> String {
        self.token_for("maria", full_access())
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn mock_get(&self, route: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    async fn mock_reference_data(&self) {
        self.mock_get(
            "/clientes/",
            json!([{
                "id_cliente": 1,
                "tipo_cliente": 1,
                "nombre": "Ana",
                "apellido": "Torres",
                "direccion": "Av. Amazonas 123",
                "telefono": "0991234567",
                "correo_electronico": "ana@example.com",
                "estado": "Activo",
                "tipo_identificacion": "Cedula",
                "numero_identificacion": "1710034065",
                "fecha_nacimiento": "1990-04-12"
            }, {
                "id_cliente": 2,
                "tipo_cliente": 1,
                "nombre": "Luis",
                "apellido": "Vera",
                "direccion": "Calle Sucre 45",
                "telefono": "0987654321",
                "correo_electronico": "luis@example.com",
                "estado": "Activo",
                "tipo_identificacion": "Cedula",
                "numero_identificacion": "0912345675",
                "fecha_nacimiento": "1985-09-30"
            }]),
        )
        .await;
        self.mock_get(
            "/tipo_clientes/",
            json!([{ "id_tipcli": 1, "nombre": "Minorista", "monto_maximo": "250.00" }]),
        )
        .await;
        self.mock_get(
            "/productos",
            json!({ "productos": [
                { "id_producto": 7, "nombre": "Cuaderno", "pvp": "10.00", "stock_actual": 5, "estado": "ACTIVO", "graba_iva": true },
                { "id_producto": 8, "nombre": "Agotado", "pvp": "20.00", "stock_actual": 0, "estado": "ACTIVO", "graba_iva": false }
            ]}),
        )
        .await;
    }

    async fn mock_debt(&self, debt: &str) {
        self.mock_get(
            "/clientes/deudores",
            json!([{ "id_cliente": 1, "total_deuda": debt, "facturas_pendientes": [{ "id_factura": 3 }] }]),
        )
        .await;
    }

    /// Debtor list with the given debt of clients 1 and 2.
    fn debtors(first: &str, second: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!([
            { "id_cliente": 1, "total_deuda": first, "facturas_pendientes": [] },
            { "id_cliente": 2, "total_deuda": second, "facturas_pendientes": [] }
        ]))
    }

    async fn draft_view(&self, token: &str, id: &str) -> Value {
        let (status, view) = self.call(Method::GET, &format!("/api/drafts/{}", id), Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        view
    }

    /// Opens a credit draft for client 1 with two units of product 7 (total 23.00).
    async fn credit_draft(&self, token: &str) -> String {
        let (status, draft) = self.call(Method::POST, "/api/drafts", Some(token), None).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = draft["id"].as_str().unwrap().to_string();

        let base = format!("/api/drafts/{}", id);
        let (status, _) = self
            .call(Method::PUT, &format!("{}/client", base), Some(token), Some(json!({ "client_id": 1 })))
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = self
            .call(Method::PUT, &format!("{}/payment", base), Some(token), Some(json!({ "payment_type": "Credito" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, view) = self
            .call(
                Method::PUT,
                &format!("{}/lines/0", base),
                Some(token),
                Some(json!({ "product_id": 7, "quantity": 2 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["grand_total"].as_f64(), Some(23.0));
        assert_eq!(view["state"], "credit_check_required");

        id
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_api_requires_token() {
    let app = TestApp::new().await;

    let (status, _) = app.call(Method::GET, "/api/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.call(Method::GET, "/api/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_returns_token_and_navigation() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/usuarios/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_usuario": 4,
            "permisos": [
                { "id_permiso": 1, "nombre_permiso": "Clientes", "descripcion": "CRU", "url_permiso": "/clientes", "estado": true, "id_modulo": "FAC" },
                { "id_permiso": 2, "nombre_permiso": "Facturas", "descripcion": "CRUD", "url_permiso": "/facturas", "estado": false, "id_modulo": "FAC" }
            ]
        })))
        .mount(&app.server)
        .await;

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "usuario": "maria", "contrasena": "secreta" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let labels: Vec<&str> = body["navigation"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["Inicio", "Clientes", "Reporte Clientes"]);

    let token = body["token"].as_str().unwrap();
    let (status, me) = app.call(Method::GET, "/api/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "maria");
    assert_eq!(me["user_id"], 4);
}

#[tokio::test]
async fn test_login_rejection_uses_service_message() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/usuarios/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Contraseña incorrecta" })))
        .mount(&app.server)
        .await;

    let (status, body) = app
        .call(Method::POST, "/auth/login", None, Some(json!({ "usuario": "maria", "contrasena": "x" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Contraseña incorrecta");
}

#[tokio::test]
async fn test_missing_capability_is_forbidden() {
    let app = TestApp::new().await;
    let token = app.token_for("pedro", Permissions::from_grants(&[grant("Clientes", "R", true)]));

    let (status, _) = app.call(Method::GET, "/api/products", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call(Method::GET, "/api/reports/clients", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_dashboard_degrades_to_zero() {
    let app = TestApp::new().await;
    app.mock_get("/tipo_clientes/", json!([{ "id_tipcli": 1, "nombre": "Minorista", "monto_maximo": 0 }]))
        .await;

    let (status, body) = app.call(Method::GET, "/api/dashboard", Some(&app.token()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["client_types"], 1);
    assert_eq!(body["stats"]["clients"], 0);
    assert_eq!(body["stats"]["invoices"], 0);
}

#[tokio::test]
async fn test_client_type_validation_errors() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/client-types",
            Some(&app.token()),
            Some(json!({ "nombre": "A1", "monto_maximo": -5 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields: Vec<&str> = body["field_errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"nombre"));
    assert!(fields.contains(&"monto_maximo"));
}

#[tokio::test]
async fn test_client_type_duplicate_name() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/tipo_clientes/"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"nombre":["tipo cliente with this nombre already exists."]}"#),
        )
        .mount(&app.server)
        .await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/client-types",
            Some(&app.token()),
            Some(json!({ "nombre": "Mayorista", "monto_maximo": 500 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "A client type with this name already exists.");
}

#[tokio::test]
async fn test_client_type_listing_marks_used_types() {
    let app = TestApp::new().await;
    app.mock_reference_data().await;

    let (status, body) = app.call(Method::GET, "/api/client-types", Some(&app.token()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id_tipcli"], 1);
    assert_eq!(body[0]["is_deletable"], false);
}

#[tokio::test]
async fn test_credit_draft_requires_check_before_submit() {
    let app = TestApp::new().await;
    app.mock_reference_data().await;
    let token = app.token();
    let id = app.credit_draft(&token).await;

    let (status, _) = app
        .call(Method::POST, &format!("/api/drafts/{}/submit", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_credit_check_rejection_is_reported() {
    let app = TestApp::new().await;
    app.mock_reference_data().await;
    app.mock_debt("240.00").await;
    let token = app.token();
    let id = app.credit_draft(&token).await;

    let (status, body) = app
        .call(Method::POST, &format!("/api/drafts/{}/credit-check", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"]["result"], "rejected");
    assert_eq!(body["decision"]["shortfall"].as_f64(), Some(13.0));
    assert_eq!(body["draft"]["state"], "credit_check_required");
    assert_eq!(body["draft"]["submit_enabled"], false);
}

#[tokio::test]
async fn test_credit_draft_end_to_end() {
    let app = TestApp::new().await;
    app.mock_reference_data().await;
    app.mock_debt("200.00").await;
    Mock::given(method("POST"))
        .and(path("/facturas/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id_factura": 41 })))
        .expect(1)
        .mount(&app.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/detalle_facturas/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&app.server)
        .await;

    let token = app.token();
    let id = app.credit_draft(&token).await;

    let (status, body) = app
        .call(Method::POST, &format!("/api/drafts/{}/credit-check", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"]["result"], "approved");
    assert_eq!(body["draft"]["state"], "credit_approved");
    assert_eq!(body["draft"]["submit_enabled"], true);

    let (status, body) = app
        .call(Method::POST, &format!("/api/drafts/{}/submit", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["invoice_id"], 41);
    assert_eq!(body["draft"]["state"], "submitted");

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/drafts/{}/lines/0", id),
            Some(&token),
            Some(json!({ "product_id": 7, "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_failed_submit_returns_credit_draft_to_check() {
    let app = TestApp::new().await;
    app.mock_reference_data().await;
    app.mock_debt("0").await;
    Mock::given(method("POST"))
        .and(path("/facturas/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&app.server)
        .await;

    let token = app.token();
    let id = app.credit_draft(&token).await;
    app.call(Method::POST, &format!("/api/drafts/{}/credit-check", id), Some(&token), None)
        .await;

    let (status, _) = app
        .call(Method::POST, &format!("/api/drafts/{}/submit", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, view) = app.call(Method::GET, &format!("/api/drafts/{}", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["state"], "credit_check_required");
    assert!(view["last_error"].is_string());
}

#[tokio::test]
async fn test_drafts_are_private_to_their_owner() {
    let app = TestApp::new().await;
    app.mock_reference_data().await;

    let (_, draft) = app.call(Method::POST, "/api/drafts", Some(&app.token()), None).await;
    let id = draft["id"].as_str().unwrap();
    assert_eq!(draft["lines"].as_array().unwrap().len(), 1);
    assert_eq!(draft["payment_type"], "Efectivo");

    let other = app.token_for("pedro", full_access());
    let (status, _) = app.call(Method::GET, &format!("/api/drafts/{}", id), Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cash_draft_cannot_be_credit_checked() {
    let app = TestApp::new().await;
    app.mock_reference_data().await;
    let token = app.token();

    let (_, draft) = app.call(Method::POST, "/api/drafts", Some(&token), None).await;
    let id = draft["id"].as_str().unwrap();

    let (status, _) = app
        .call(Method::POST, &format!("/api/drafts/{}/credit-check", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_credit_check_is_void_when_client_changes_meanwhile() {
    let app = TestApp::new().await;
    app.mock_reference_data().await;
    Mock::given(method("GET"))
        .and(path("/clientes/deudores"))
        .respond_with(TestApp::debtors("0.00", "240.00").set_delay(Duration::from_millis(400)))
        .mount(&app.server)
        .await;
    let token = app.token();
    let id = app.credit_draft(&token).await;

    let check_path = format!("/api/drafts/{}/credit-check", id);
    let check = app.call(Method::POST, &check_path, Some(&token), None);
    let switch = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        app.call(
            Method::PUT,
            &format!("/api/drafts/{}/client", id),
            Some(&token),
            Some(json!({ "client_id": 2 })),
        )
        .await
    };
    let ((check_status, _), (switch_status, _)) = tokio::join!(check, switch);
    assert_eq!(switch_status, StatusCode::OK);
    assert_eq!(check_status, StatusCode::CONFLICT);

    let view = app.draft_view(&token, &id).await;
    assert_eq!(view["client"]["id_cliente"], 2);
    assert_eq!(view["state"], "credit_check_required");
    assert_eq!(view["submit_enabled"], false);

    // Checked again, client 2's own debt applies: 240 + 23 > 250.
    let (status, body) = app
        .call(Method::POST, &format!("/api/drafts/{}/credit-check", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"]["result"], "rejected");
    assert_eq!(body["decision"]["shortfall"].as_f64(), Some(13.0));
}

#[tokio::test]
async fn test_submit_settles_draft_when_caller_goes_away() {
    let app = TestApp::new().await;
    app.mock_reference_data().await;
    app.mock_debt("0").await;
    Mock::given(method("POST"))
        .and(path("/facturas/"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "id_factura": 52 }))
                .set_delay(Duration::from_millis(800)),
        )
        .expect(1)
        .mount(&app.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/detalle_facturas/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "ok": true })))
        .mount(&app.server)
        .await;

    let token = app.token();
    let id = app.credit_draft(&token).await;
    let (status, _) = app
        .call(Method::POST, &format!("/api/drafts/{}/credit-check", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let submit_path = format!("/api/drafts/{}/submit", id);
    let submit = app.call(Method::POST, &submit_path, Some(&token), None);
    assert!(tokio::time::timeout(Duration::from_millis(200), submit).await.is_err());

    let mut view = app.draft_view(&token, &id).await;
    for _ in 0..60 {
        if view["state"] != "submitting" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        view = app.draft_view(&token, &id).await;
    }
    assert_eq!(view["state"], "submitted");
    assert_eq!(view["invoice_id"], 52);
}

#[tokio::test]
async fn test_submit_rechecks_credit_against_current_debt() {
    let app = TestApp::new().await;
    app.mock_reference_data().await;
    // First read (the check) sees 200.00, the re-check at submit sees 240.00.
    Mock::given(method("GET"))
        .and(path("/clientes/deudores"))
        .respond_with(TestApp::debtors("200.00", "0.00"))
        .up_to_n_times(1)
        .mount(&app.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/clientes/deudores"))
        .respond_with(TestApp::debtors("240.00", "0.00"))
        .mount(&app.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/facturas/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id_factura": 60 })))
        .expect(0)
        .mount(&app.server)
        .await;

    let token = app.token();
    let id = app.credit_draft(&token).await;
    let (_, body) = app
        .call(Method::POST, &format!("/api/drafts/{}/credit-check", id), Some(&token), None)
        .await;
    assert_eq!(body["decision"]["result"], "approved");

    let (status, body) = app
        .call(Method::POST, &format!("/api/drafts/{}/submit", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().starts_with("Credit limit exceeded"));

    let view = app.draft_view(&token, &id).await;
    assert_eq!(view["state"], "credit_check_required");
    assert_eq!(view["submit_enabled"], false);
}

#[tokio::test]
async fn test_credit_check_fails_when_receivables_unavailable() {
    let app = TestApp::new().await;
    app.mock_reference_data().await;
    Mock::given(method("GET"))
        .and(path("/clientes/deudores"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&app.server)
        .await;

    let token = app.token();
    let id = app.credit_draft(&token).await;

    let (status, body) = app
        .call(Method::POST, &format!("/api/drafts/{}/credit-check", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].is_string());

    let view = app.draft_view(&token, &id).await;
    assert_eq!(view["state"], "credit_check_required");
    assert_eq!(view["submit_enabled"], false);
    assert_eq!(view["credit_check_enabled"], true);
}
