//! HTTP surface (§6): request/response DTOs, request authentication, and the
//! route handlers wiring every module in this crate together behind `axum`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path as AxumPath, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use zeroid_common::model::{
    DocumentType, PublicSignals, Requirement, RequirementType, VerificationRecord,
    VerificationStatus,
};

pub mod audit;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod error;
pub mod escrow;
pub mod issuer;
pub mod keys;
pub mod kyc;
pub mod nullifiers;
pub mod ratelimit;
pub mod sanctions;
pub mod stores;
pub mod time;
pub mod validation;
pub mod verifications;

use audit::AuditLog;
use cache::ProofCache;
use config::Config;
use credentials::CredentialStore;
use error::{
    ApiError, CODE_NOT_FOUND, CODE_NULLIFIER_REPLAY, CODE_SANCTIONED_COUNTRY, CODE_VALIDATION,
};
use escrow::EscrowService;
use issuer::{CredentialIssuer, CredentialRequest, IssuanceError};
use keys::{load_store_master_key, IssuerKeyPair, RegulatorKeyRing};
use kyc::StubKycProvider;
use nullifiers::NullifierRegistry;
use ratelimit::RateLimiter;
use sanctions::SanctionsRegistry;
use stores::{open_root_db, EncryptedKv};
use verifications::VerificationStore;
use zeroid_common::hkdf::derive_store_key;
use zeroid_verifier::{LoadedVerifyingKey, ProofJson};

pub const API_VERSION: &str = "1";
pub const SERVICE_NAME: &str = "zeroid-backend";

#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    issuer: Arc<CredentialIssuer>,
    escrow: Arc<EscrowService>,
    credentials: Arc<CredentialStore>,
    sanctions: Arc<SanctionsRegistry>,
    nullifiers: Arc<NullifierRegistry>,
    cache: Arc<ProofCache>,
    audit: Arc<AuditLog>,
    verifications: Arc<VerificationStore>,
    rate_limiter: Arc<RateLimiter>,
    vkey: Option<Arc<LoadedVerifyingKey>>,
    started_at_ms: i64,
}

impl AppState {
    /// Constructs every service exactly once at boot (§5 "Shared resources"
    /// are created at startup, not lazily on first request), opening the
    /// single root `sled::Db` and deriving one HKDF sub-key per named store.
    pub fn bootstrap(config: Config) -> anyhow::Result<Self> {
        let db = open_root_db(&config.data_dir)?;
        let master_key = load_store_master_key();

        let escrow_kv = EncryptedKv::open(&db, "escrow", derive_store_key(&master_key, "escrow"))?;
        let audit_store =
            stores::EventStore::open(db.clone(), "audit", derive_store_key(&master_key, "audit"))?;
        let audit = Arc::new(AuditLog::new(audit_store));
        let escrow = Arc::new(EscrowService::new(escrow_kv, audit.clone()));

        let credentials = Arc::new(CredentialStore::new(
            stores::DocStore::open(&db, "credentials")?,
            derive_store_key(&master_key, "credentials"),
        ));

        let nullifiers = Arc::new(NullifierRegistry::new(EncryptedKv::open(
            &db,
            "nullifiers",
            derive_store_key(&master_key, "nullifiers"),
        )?));

        let cache = Arc::new(ProofCache::new(
            config::CACHE_L1_CAPACITY,
            EncryptedKv::open(&db, "proof-cache", derive_store_key(&master_key, "proof-cache"))?,
        ));

        let verifications = Arc::new(VerificationStore::new(EncryptedKv::open(
            &db,
            "verifications",
            derive_store_key(&master_key, "verifications"),
        )?));

        let sanctions = Arc::new(match &config.sanctions_list_path {
            Some(path) => SanctionsRegistry::from_file(path)?,
            None => SanctionsRegistry::from_default_seed(),
        });

        let issuer_keys = IssuerKeyPair::load_or_generate(&config)?;
        let regulator_keys = Arc::new(RegulatorKeyRing::new());

        let issuer = Arc::new(CredentialIssuer::new(
            issuer_keys.private_key,
            issuer_keys.public_key,
            sanctions.clone(),
            Arc::new(StubKycProvider),
            escrow.clone(),
            credentials.clone(),
            regulator_keys,
            audit.clone(),
        ));

        let vkey = match &config.vkey_path {
            Some(path) => Some(Arc::new(LoadedVerifyingKey::load(path)?)),
            None => {
                tracing::warn!(
                    "ZEROID_VKEY_PATH not set; proof verification endpoints will return 503"
                );
                None
            }
        };

        if !config.store_master_key_was_configured {
            tracing::warn!(
                "running with an ephemeral store master key; every encrypted store is \
                 unreadable across a restart"
            );
        }

        Ok(AppState {
            config: Arc::new(config),
            issuer,
            escrow,
            credentials,
            sanctions,
            nullifiers,
            cache,
            audit,
            verifications,
            rate_limiter: Arc::new(RateLimiter::new()),
            vkey,
            started_at_ms: time::now_ms(),
        })
    }
}

/// Checks the `X-ZeroID-Version` and `Authorization: Bearer <api_key>`
/// headers, then consumes one token from that key's rate-limit bucket
/// (§5, §6). A deployment with an empty `ZEROID_API_KEYS` rejects every
/// request rather than admitting unauthenticated traffic.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    let version_ok = headers
        .get("x-zeroid-version")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == API_VERSION)
        .unwrap_or(false);
    if !version_ok {
        return Err(ApiError::bad_request(
            CODE_VALIDATION,
            "unsupported X-ZeroID-Version",
        ));
    }

    let api_key = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
        .ok_or_else(|| ApiError::unauthorized("missing bearer API key"))?;

    if state.config.api_keys.is_empty() || !state.config.api_keys.contains(&api_key) {
        return Err(ApiError::unauthorized("invalid API key"));
    }

    if !state.rate_limiter.check(&api_key) {
        return Err(ApiError::rate_limited());
    }

    Ok(api_key)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: i64,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: API_VERSION,
        timestamp: time::now_ms(),
    })
}

#[derive(Deserialize)]
struct RequirementBody {
    #[serde(rename = "type")]
    kind: String,
    value: serde_json::Value,
}

#[derive(Deserialize)]
struct CreateVerificationBody {
    #[serde(rename = "userId")]
    user_id: String,
    requirements: Vec<RequirementBody>,
}

#[derive(Serialize)]
struct CreateVerificationResponse {
    id: String,
    status: VerificationStatus,
}

async fn create_verification_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateVerificationBody>,
) -> Result<(StatusCode, Json<CreateVerificationResponse>), ApiError> {
    authenticate(&state, &headers)?;

    validation::validate_requirements_length(req.requirements.len())
        .map_err(|e| ApiError::validation(vec![error::ValidationDetail {
            path: "requirements".to_string(),
            message: e.to_string(),
        }]))?;

    let mut requirements = Vec::with_capacity(req.requirements.len());
    for r in req.requirements {
        validation::validate_requirement_type(&r.kind).map_err(|e| {
            ApiError::validation(vec![error::ValidationDetail {
                path: "requirements[].type".to_string(),
                message: e.to_string(),
            }])
        })?;
        let kind = match r.kind.as_str() {
            "age_gte" => RequirementType::AgeGte,
            "country_not" => RequirementType::CountryNot,
            "sanctions_clear" => RequirementType::SanctionsClear,
            _ => RequirementType::SybilUnique,
        };
        requirements.push(Requirement { kind, value: r.value });
    }

    let record = state
        .verifications
        .create(req.user_id, requirements)
        .map_err(ApiError::internal)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateVerificationResponse {
            id: record.id,
            status: record.status,
        }),
    ))
}

async fn get_verification_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<VerificationRecord>, ApiError> {
    authenticate(&state, &headers)?;
    let record = state
        .verifications
        .get(&id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found(CODE_NOT_FOUND, format!("verification {id} not found")))?;
    Ok(Json(record))
}

#[derive(Deserialize)]
struct CredentialRequestBody {
    #[serde(rename = "fullName")]
    full_name: String,
    #[serde(rename = "dateOfBirth")]
    date_of_birth: String,
    #[serde(rename = "countryCode")]
    country_code: u16,
    #[serde(rename = "documentType")]
    document_type: String,
    #[serde(rename = "documentNumber")]
    document_number: String,
    #[serde(rename = "boundAddress")]
    bound_address: Option<String>,
    level: Option<u8>,
}

#[derive(Serialize)]
struct IssueCredentialResponse {
    credential: zeroid_common::model::CredentialWire,
    #[serde(rename = "escrowId")]
    escrow_id: String,
}

fn validation_error(path: &str, message: impl ToString) -> ApiError {
    ApiError::validation(vec![error::ValidationDetail {
        path: path.to_string(),
        message: message.to_string(),
    }])
}

async fn issue_credential_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CredentialRequestBody>,
) -> Result<(StatusCode, Json<IssueCredentialResponse>), ApiError> {
    authenticate(&state, &headers)?;

    validation::validate_date_of_birth(&req.date_of_birth)
        .map_err(|e| validation_error("dateOfBirth", e))?;
    validation::validate_country_code(req.country_code)
        .map_err(|e| validation_error("countryCode", e))?;
    let document_type = validation::validate_document_type(&req.document_type)
        .map_err(|e| validation_error("documentType", e))?;
    if let Some(address) = &req.bound_address {
        validation::validate_bound_address(address).map_err(|e| validation_error("boundAddress", e))?;
    }
    if let Some(level) = req.level {
        validation::validate_level(level).map_err(|e| validation_error("level", e))?;
    }

    let request = CredentialRequest {
        full_name: req.full_name,
        date_of_birth: req.date_of_birth,
        country_code: req.country_code,
        document_type,
        document_number: req.document_number,
        bound_address: req.bound_address,
        level: req.level,
    };

    match state.issuer.issue(request) {
        Ok(issued) => Ok((
            StatusCode::CREATED,
            Json(IssueCredentialResponse {
                credential: issued.credential,
                escrow_id: issued.escrow_id,
            }),
        )),
        Err(IssuanceError::Sanctioned(code)) => Err(ApiError::forbidden(
            CODE_SANCTIONED_COUNTRY,
            format!("country {code} is under comprehensive sanctions"),
        )),
        Err(IssuanceError::KycFailed(confidence)) => Err(ApiError::unprocessable(
            error::CODE_KYC_FAILED,
            format!("KYC verification failed with confidence {confidence:.2}"),
        )),
        Err(IssuanceError::InvalidAge(e)) => Err(validation_error("dateOfBirth", e)),
        Err(e @ (IssuanceError::Escrow(_) | IssuanceError::Store(_) | IssuanceError::Key(_))) => {
            Err(ApiError::internal(e))
        }
    }
}

#[derive(Clone, Deserialize, Serialize)]
struct ProofEnvelope {
    proof: serde_json::Value,
    #[serde(rename = "publicSignals")]
    public_signals: Vec<String>,
}

#[derive(Serialize)]
struct ProofVerifyResponse {
    valid: bool,
    nullifier: String,
    cached: bool,
}

#[derive(Debug, thiserror::Error)]
enum VerifyOneError {
    #[error("{0}")]
    Validation(String),
    #[error("replay")]
    Replay,
    #[error("no verification key loaded")]
    NoVkey,
    #[error("internal: {0}")]
    Internal(String),
}

/// Runs the full `/api/v1/proof/verify` pipeline (§4.6) for one
/// `(proof, publicSignals)` pair, shared by the single-verify and
/// aggregate-verify handlers.
async fn verify_one(state: AppState, envelope: ProofEnvelope) -> Result<ProofVerifyResponse, VerifyOneError> {
    validation::validate_public_signals_length(envelope.public_signals.len())
        .map_err(|e| VerifyOneError::Validation(e.to_string()))?;

    let proof_json = serde_json::to_string(&envelope.proof)
        .map_err(|e| VerifyOneError::Validation(e.to_string()))?;
    let signals_json = serde_json::to_string(&envelope.public_signals)
        .map_err(|e| VerifyOneError::Validation(e.to_string()))?;
    let fingerprint = cache::fingerprint(&proof_json, &signals_json);

    if let Some(hit) = state.cache.get(&fingerprint).map_err(|e| VerifyOneError::Internal(e.to_string()))? {
        return Ok(ProofVerifyResponse {
            valid: hit.valid,
            nullifier: hit.nullifier,
            cached: true,
        });
    }

    let Some(vkey) = state.vkey.clone() else {
        return Err(VerifyOneError::NoVkey);
    };

    let parsed = PublicSignals::from_v1_array(&envelope.public_signals)
        .map_err(|e| VerifyOneError::Validation(e.to_string()))?;
    let nullifier_decimal = zeroid_common::fr_to_decimal(&parsed.nullifier);

    let proof_obj = ProofJson::from_json_str(&proof_json)
        .map_err(|e| VerifyOneError::Validation(e.to_string()))?
        .to_proof()
        .map_err(|e| VerifyOneError::Validation(e.to_string()))?;

    let mut public_inputs = Vec::with_capacity(envelope.public_signals.len());
    for s in &envelope.public_signals {
        let fr = zeroid_common::fr_from_decimal(s).map_err(|e| VerifyOneError::Validation(e.to_string()))?;
        public_inputs.push(fr);
    }

    let vkey_for_task = vkey.clone();
    let valid = tokio::task::spawn_blocking(move || {
        zeroid_verifier::verify_groth16(&vkey_for_task, &proof_obj, &public_inputs)
    })
    .await
    .map_err(|e| VerifyOneError::Internal(e.to_string()))?
    .map_err(|e| VerifyOneError::Validation(e.to_string()))?;

    if valid {
        let app_id_decimal = zeroid_common::fr_to_decimal(&parsed.app_id);
        let won = state
            .nullifiers
            .register(&nullifier_decimal, &app_id_decimal, None)
            .map_err(|e| VerifyOneError::Internal(e.to_string()))?;
        if !won {
            return Err(VerifyOneError::Replay);
        }
    }

    let entry = zeroid_common::model::ProofCacheEntry {
        proof_fingerprint: fingerprint.clone(),
        valid,
        nullifier: nullifier_decimal.clone(),
        verified_at_ms: time::now_ms(),
    };
    state
        .cache
        .set(&fingerprint, entry)
        .map_err(|e| VerifyOneError::Internal(e.to_string()))?;

    Ok(ProofVerifyResponse {
        valid,
        nullifier: nullifier_decimal,
        cached: false,
    })
}

impl From<VerifyOneError> for ApiError {
    fn from(err: VerifyOneError) -> Self {
        match err {
            VerifyOneError::Validation(msg) => validation_error("proof", msg),
            VerifyOneError::Replay => {
                ApiError::conflict(CODE_NULLIFIER_REPLAY, "nullifier has already been consumed")
            }
            VerifyOneError::NoVkey => {
                ApiError::unavailable("no verification key is loaded for this deployment")
            }
            VerifyOneError::Internal(msg) => ApiError::internal(msg),
        }
    }
}

async fn verify_proof_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(envelope): Json<ProofEnvelope>,
) -> Result<Json<ProofVerifyResponse>, ApiError> {
    authenticate(&state, &headers)?;
    let response = verify_one(state, envelope).await?;
    Ok(Json(response))
}

#[derive(Deserialize)]
struct ProofAggregateBody {
    proofs: Vec<ProofEnvelope>,
}

#[derive(Clone, Serialize)]
struct AggregateResultItem {
    index: usize,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct AggregateResponse {
    #[serde(rename = "allValid")]
    all_valid: bool,
    total: usize,
    #[serde(rename = "validCount")]
    valid_count: usize,
    results: Vec<AggregateResultItem>,
}

async fn aggregate_proofs_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ProofAggregateBody>,
) -> Result<Json<AggregateResponse>, ApiError> {
    authenticate(&state, &headers)?;

    validation::validate_proofs_length(req.proofs.len())
        .map_err(|e| validation_error("proofs", e))?;

    let mut join_set = tokio::task::JoinSet::new();
    let mut index_by_task = HashMap::new();
    for (index, envelope) in req.proofs.into_iter().enumerate() {
        let state = state.clone();
        let handle = join_set.spawn(async move { verify_one(state, envelope).await });
        index_by_task.insert(handle.id(), index);
    }

    let mut results: Vec<Option<AggregateResultItem>> = vec![None; index_by_task.len()];
    while let Some(joined) = join_set.join_next_with_id().await {
        match joined {
            Ok((task_id, Ok(response))) => {
                let index = index_by_task[&task_id];
                results[index] = Some(AggregateResultItem {
                    index,
                    valid: response.valid,
                    error: None,
                });
            }
            Ok((task_id, Err(err))) => {
                let index = index_by_task[&task_id];
                results[index] = Some(AggregateResultItem {
                    index,
                    valid: false,
                    error: Some(err.to_string()),
                });
            }
            Err(join_err) => {
                // The task's index is recoverable from the join error's id even
                // when the task panicked outright.
                if let Some(index) = index_by_task.get(&join_err.id()) {
                    results[*index] = Some(AggregateResultItem {
                        index: *index,
                        valid: false,
                        error: Some("verification task panicked".to_string()),
                    });
                }
            }
        }
    }

    let results: Vec<AggregateResultItem> = results.into_iter().flatten().collect();
    let valid_count = results.iter().filter(|r| r.valid).count();
    let all_valid = valid_count == results.len();

    Ok(Json(AggregateResponse {
        all_valid,
        total: results.len(),
        valid_count,
        results,
    }))
}

pub fn app_router(state: AppState) -> Router {
    let mut cors = CorsLayer::new();
    cors = match &state.config.cors_origin {
        Some(origin) => {
            if let Ok(value) = origin.parse::<axum::http::HeaderValue>() {
                cors.allow_origin(value)
            } else {
                cors.allow_origin(tower_http::cors::Any)
            }
        }
        None => cors.allow_origin(tower_http::cors::Any),
    };
    let cors = cors
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/verify", post(create_verification_handler))
        .route("/api/v1/verify/:id", get(get_verification_handler))
        .route("/api/v1/credential", post(issue_credential_handler))
        .route("/api/v1/proof/verify", post(verify_proof_handler))
        .route("/api/v1/proof/aggregate", post(aggregate_proofs_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(config::REQUEST_TIMEOUT_SECS)))
                .layer(cors),
        )
        .with_state(state)
}

/// Binds `config.host:config.port` and serves until a shutdown signal
/// arrives (Ctrl-C, or SIGTERM on unix), per §6's graceful-shutdown note.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = app_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "zeroid-backend listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
}
