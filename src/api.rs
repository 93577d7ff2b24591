use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use crate::errors::AppError;
use crate::models::{
    BookingRecord, Coupon, CouponInput, CouponsEnvelope, CourtRecord, CourtsEnvelope, UserEnvelope,
    UserProfile,
};

/// BookingApi
///
/// Contract of the upstream booking REST API. Handlers and the session
/// provider only see this trait, so the HTTP client can be swapped for
/// [`MockBookingApi`] in tests.
#[async_trait]
pub trait BookingApi: Send + Sync {
    // GET /api/courts?limit=N
    async fn list_courts(&self, limit: usize) -> Result<Vec<CourtRecord>, AppError>;

    // GET /api/bookings/confirmed/{userId}, bearer authenticated.
    async fn confirmed_bookings(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<Vec<BookingRecord>, AppError>;

    // GET /api/users/{userId}
    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, AppError>;

    // --- Coupons (admin) ---
    async fn list_coupons(&self, token: &str) -> Result<Vec<Coupon>, AppError>;
    async fn create_coupon(&self, token: &str, input: &CouponInput) -> Result<Coupon, AppError>;
    async fn update_coupon(
        &self,
        token: &str,
        id: &str,
        input: &CouponInput,
    ) -> Result<Coupon, AppError>;
    async fn delete_coupon(&self, token: &str, id: &str) -> Result<(), AppError>;
}

/// ApiState
///
/// Shared handle to the upstream API held in the application state.
pub type ApiState = Arc<dyn BookingApi>;

/// HttpBookingApi
///
/// reqwest-backed implementation talking to `base_url`.
#[derive(Clone)]
pub struct HttpBookingApi {
    client: Client,
    base_url: String,
}

impl HttpBookingApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends the request and maps transport errors and non-2xx statuses onto
    /// the error taxonomy.
    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, AppError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!("upstream request failed: {}", e);
            AppError::Network(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        Err(match status {
            StatusCode::UNAUTHORIZED => AppError::auth("auth/invalid-token"),
            StatusCode::FORBIDDEN => AppError::auth("auth/unauthorized"),
            StatusCode::NOT_FOUND => AppError::NotFound(format!("Nothing found at {}", response.url().path())),
            other => AppError::Network(format!("upstream returned {}", other)),
        })
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AppError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| AppError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl BookingApi for HttpBookingApi {
    async fn list_courts(&self, limit: usize) -> Result<Vec<CourtRecord>, AppError> {
        let request = self
            .client
            .get(self.url("/api/courts"))
            .query(&[("limit", limit)]);
        let envelope: CourtsEnvelope = self.json(request).await?;

        if !envelope.success {
            return Err(AppError::Network(
                envelope.error.unwrap_or_else(|| "courts request was not successful".to_string()),
            ));
        }
        Ok(envelope.data)
    }

    async fn confirmed_bookings(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<Vec<BookingRecord>, AppError> {
        let path = format!("/api/bookings/confirmed/{}", urlencoding::encode(user_id));
        let request = self.client.get(self.url(&path)).bearer_auth(token);
        self.json(request).await
    }

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, AppError> {
        let path = format!("/api/users/{}", urlencoding::encode(user_id));
        let envelope: UserEnvelope = self.json(self.client.get(self.url(&path))).await?;
        Ok(envelope.user)
    }

    async fn list_coupons(&self, token: &str) -> Result<Vec<Coupon>, AppError> {
        let request = self.client.get(self.url("/api/coupons")).bearer_auth(token);
        let envelope: CouponsEnvelope = self.json(request).await?;
        Ok(envelope.coupons)
    }

    async fn create_coupon(&self, token: &str, input: &CouponInput) -> Result<Coupon, AppError> {
        let request = self
            .client
            .post(self.url("/api/coupons"))
            .bearer_auth(token)
            .json(input);
        self.json(request).await
    }

    async fn update_coupon(
        &self,
        token: &str,
        id: &str,
        input: &CouponInput,
    ) -> Result<Coupon, AppError> {
        let path = format!("/api/coupons/{}", urlencoding::encode(id));
        let request = self.client.put(self.url(&path)).bearer_auth(token).json(input);
        self.json(request).await
    }

    async fn delete_coupon(&self, token: &str, id: &str) -> Result<(), AppError> {
        let path = format!("/api/coupons/{}", urlencoding::encode(id));
        self.send(self.client.delete(self.url(&path)).bearer_auth(token))
            .await?;
        Ok(())
    }
}

/// MockBookingApi
///
/// In-memory stand-in for the upstream API, used by unit and router tests.
/// Coupons live behind a mutex so CRUD calls are observable; `court_fetches`
/// counts `list_courts` calls for cache assertions.
#[derive(Clone, Default)]
pub struct MockBookingApi {
    pub courts: Vec<CourtRecord>,
    pub profiles: HashMap<String, UserProfile>,
    pub bookings: Vec<BookingRecord>,
    pub coupons: Arc<Mutex<Vec<Coupon>>>,
    /// When true, every call fails with a network error.
    pub should_fail: bool,
    /// When true, only profile lookups fail (role still unknown).
    pub profiles_unavailable: bool,
    pub court_fetches: Arc<AtomicUsize>,
}

impl MockBookingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn with_courts(mut self, courts: Vec<CourtRecord>) -> Self {
        self.courts = courts;
        self
    }

    pub fn with_profile(mut self, id: &str, email: &str, role: &str) -> Self {
        self.profiles.insert(
            id.to_string(),
            UserProfile {
                id: id.to_string(),
                email: email.to_string(),
                role: Some(role.to_string()),
                ..UserProfile::default()
            },
        );
        self
    }

    pub fn with_coupons(self, coupons: Vec<Coupon>) -> Self {
        if let Ok(mut stored) = self.coupons.lock() {
            *stored = coupons;
        }
        self
    }

    pub fn court_fetches(&self) -> usize {
        self.court_fetches.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), AppError> {
        if self.should_fail {
            return Err(AppError::Network("Mock API Error: Simulation requested".to_string()));
        }
        Ok(())
    }

    fn check_token(&self, token: &str) -> Result<(), AppError> {
        self.check()?;
        if token.is_empty() {
            return Err(AppError::auth("auth/missing-token"));
        }
        Ok(())
    }

    fn store(&self) -> Result<std::sync::MutexGuard<'_, Vec<Coupon>>, AppError> {
        self.coupons
            .lock()
            .map_err(|_| AppError::Network("mock coupon store poisoned".to_string()))
    }
}

#[async_trait]
impl BookingApi for MockBookingApi {
    async fn list_courts(&self, limit: usize) -> Result<Vec<CourtRecord>, AppError> {
        self.court_fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.courts.iter().take(limit).cloned().collect())
    }

    async fn confirmed_bookings(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<Vec<BookingRecord>, AppError> {
        self.check_token(token)?;
        Ok(self
            .bookings
            .iter()
            .filter(|b| b.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, AppError> {
        self.check()?;
        if self.profiles_unavailable {
            return Err(AppError::Network("profile service unavailable".to_string()));
        }
        self.profiles
            .get(user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("No profile for user {}", user_id)))
    }

    async fn list_coupons(&self, token: &str) -> Result<Vec<Coupon>, AppError> {
        self.check_token(token)?;
        Ok(self.store()?.clone())
    }

    async fn create_coupon(&self, token: &str, input: &CouponInput) -> Result<Coupon, AppError> {
        self.check_token(token)?;
        let mut store = self.store()?;
        let coupon = Coupon {
            id: format!("coupon-{}", store.len() + 1),
            code: input.code.clone(),
            discount: input.discount,
            description: input.description.clone(),
            expires_at: input.expires_at,
        };
        store.push(coupon.clone());
        Ok(coupon)
    }

    async fn update_coupon(
        &self,
        token: &str,
        id: &str,
        input: &CouponInput,
    ) -> Result<Coupon, AppError> {
        self.check_token(token)?;
        let mut store = self.store()?;
        let coupon = store
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::NotFound(format!("No coupon with id {}", id)))?;
        coupon.code = input.code.clone();
        coupon.discount = input.discount;
        coupon.description = input.description.clone();
        coupon.expires_at = input.expires_at;
        Ok(coupon.clone())
    }

    async fn delete_coupon(&self, token: &str, id: &str) -> Result<(), AppError> {
        self.check_token(token)?;
        let mut store = self.store()?;
        let before = store.len();
        store.retain(|c| c.id != id);
        if store.len() == before {
            return Err(AppError::NotFound(format!("No coupon with id {}", id)));
        }
        Ok(())
    }
}
