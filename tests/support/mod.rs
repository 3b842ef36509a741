//! テスト用のインメモリAPIサーバー
#![allow(dead_code)]

use async_trait::async_trait;
use capture_common::{
    AddImagesRequest, AddImagesResponse, Capture, CaptureUpdate, Image, NewCapture,
    RemoveImagesRequest,
};
use field_capture::api::CaptureApi;
use field_capture::error::{CaptureError, Result};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    List,
    Create,
    Get,
    Update,
    Delete,
    AddImages,
    RemoveImages,
}

/// 受け付けたリクエストの記録
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List,
    Create(NewCapture),
    Get(i64),
    Update(i64, String),
    Delete(i64),
    AddImages(i64, usize),
    RemoveImages(i64, Vec<i64>),
}

#[derive(Default)]
struct State {
    next_capture_id: i64,
    next_image_id: i64,
    captures: BTreeMap<i64, Capture>,
    calls: Vec<Call>,
    failures: HashMap<Endpoint, VecDeque<u16>>,
    trim_annotations: bool,
}

#[derive(Default)]
pub struct FakeCaptureApi {
    state: Mutex<State>,
    upload_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeCaptureApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 次の呼び出しを指定ステータスで失敗させる
    pub fn fail_next(&self, endpoint: Endpoint, status: u16) {
        let mut state = self.state.lock().unwrap();
        state.failures.entry(endpoint).or_default().push_back(status);
    }

    /// サーバー側で注記の前後空白を除去する
    pub fn trim_annotations(&self) {
        self.state.lock().unwrap().trim_annotations = true;
    }

    /// add_images を `Notify` が通知されるまで止める
    pub fn gate_uploads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.upload_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, endpoint: Endpoint) -> usize {
        self.calls()
            .iter()
            .filter(|call| endpoint_of(call) == endpoint)
            .count()
    }

    pub fn server_capture(&self, id: i64) -> Option<Capture> {
        self.state.lock().unwrap().captures.get(&id).cloned()
    }

    /// サーバー側に写真付きのキャプチャを直接用意する
    pub fn seed_capture(&self, coordinates: &str, images: usize) -> Capture {
        let mut state = self.state.lock().unwrap();
        state.next_capture_id += 1;
        let id = state.next_capture_id;
        let mut capture = Capture {
            id,
            coordinates: coordinates.to_string(),
            date_created: "2024-05-01T09:00:00Z".into(),
            ..Default::default()
        };
        for _ in 0..images {
            state.next_image_id += 1;
            capture.images.push(Image {
                image_id: state.next_image_id,
                encoded: format!("seed{}", state.next_image_id),
                date_created: "2024-05-01T09:00:00Z".into(),
            });
        }
        state.captures.insert(id, capture.clone());
        capture
    }

    fn begin(&self, call: Call) -> Result<std::sync::MutexGuard<'_, State>> {
        let endpoint = endpoint_of(&call);
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if let Some(status) = state.failures.get_mut(&endpoint).and_then(|q| q.pop_front()) {
            return Err(CaptureError::Status {
                status,
                body: "injected failure".into(),
            });
        }
        Ok(state)
    }
}

fn endpoint_of(call: &Call) -> Endpoint {
    match call {
        Call::List => Endpoint::List,
        Call::Create(_) => Endpoint::Create,
        Call::Get(_) => Endpoint::Get,
        Call::Update(..) => Endpoint::Update,
        Call::Delete(_) => Endpoint::Delete,
        Call::AddImages(..) => Endpoint::AddImages,
        Call::RemoveImages(..) => Endpoint::RemoveImages,
    }
}

fn not_found(id: i64) -> CaptureError {
    CaptureError::Status {
        status: 404,
        body: format!("capture {} not found", id),
    }
}

#[async_trait]
impl CaptureApi for FakeCaptureApi {
    async fn list_captures(&self) -> Result<Vec<Capture>> {
        let state = self.begin(Call::List)?;
        Ok(state.captures.values().cloned().collect())
    }

    async fn create_capture(&self, body: &NewCapture) -> Result<Capture> {
        let mut state = self.begin(Call::Create(body.clone()))?;
        state.next_capture_id += 1;
        let capture = Capture {
            id: state.next_capture_id,
            annotation: body.annotation.clone(),
            coordinates: body.coordinates.clone(),
            date_created: body.date_created.clone(),
            date_updated: None,
            images: Vec::new(),
        };
        state.captures.insert(capture.id, capture.clone());
        Ok(capture)
    }

    async fn get_capture(&self, id: i64) -> Result<Capture> {
        let state = self.begin(Call::Get(id))?;
        state.captures.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    async fn update_capture(&self, id: i64, body: &CaptureUpdate) -> Result<Capture> {
        let mut state = self.begin(Call::Update(id, body.annotation.clone()))?;
        let trim = state.trim_annotations;
        let capture = state.captures.get_mut(&id).ok_or_else(|| not_found(id))?;
        capture.annotation = if trim {
            body.annotation.trim().to_string()
        } else {
            body.annotation.clone()
        };
        capture.date_updated = Some("2024-05-02T09:00:00Z".into());
        Ok(capture.clone())
    }

    async fn delete_capture(&self, id: i64) -> Result<()> {
        let mut state = self.begin(Call::Delete(id))?;
        state.captures.remove(&id).map(|_| ()).ok_or_else(|| not_found(id))
    }

    async fn add_images(&self, id: i64, body: &AddImagesRequest) -> Result<AddImagesResponse> {
        let gate = self.upload_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.begin(Call::AddImages(id, body.images.len()))?;
        if !state.captures.contains_key(&id) {
            return Err(not_found(id));
        }

        let mut created = Vec::new();
        for new_image in &body.images {
            state.next_image_id += 1;
            created.push(Image {
                image_id: state.next_image_id,
                encoded: new_image.encoded.clone(),
                date_created: new_image.date_created.clone(),
            });
        }
        if let Some(capture) = state.captures.get_mut(&id) {
            capture.images.extend(created.iter().cloned());
        }
        Ok(AddImagesResponse { images: created })
    }

    async fn remove_images(&self, id: i64, body: &RemoveImagesRequest) -> Result<()> {
        let mut state = self.begin(Call::RemoveImages(id, body.image_ids.clone()))?;
        let capture = state.captures.get_mut(&id).ok_or_else(|| not_found(id))?;
        capture.images.retain(|img| !body.image_ids.contains(&img.image_id));
        Ok(())
    }
}
