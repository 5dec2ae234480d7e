//! サービス層ユニットテスト用のテストダブル

use crate::application::ports::auth_provider::AuthProvider;
use crate::application::ports::query_service::{ListQuery, MutationRequest, QueryService};
use crate::application::ports::subscription_channel::{Subscription, SubscriptionChannel};
use crate::domain::entities::{HangoutCheckin, HangoutSpot, Note, NoteComment, Record};
use crate::domain::realtime::{ChangeMessage, ResourceFilter, ResourceKind};
use crate::domain::value_objects::{EntityId, GeoPoint, UserId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{Notify, mpsc, oneshot, watch};

pub fn id(value: &str) -> EntityId {
    EntityId::new(value).unwrap()
}

pub fn user(value: &str) -> UserId {
    UserId::new(value).unwrap()
}

pub fn note(note_id: &str, owner: &str, title: &str) -> Note {
    Note {
        id: id(note_id),
        owner_id: user(owner),
        title: title.into(),
        content: "shared notes".into(),
        subject: None,
        tags: Vec::new(),
        is_public: true,
        is_approved: true,
        like_count: 0,
        view_count: 0,
        author_name: Some(owner.to_string()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn comment(comment_id: &str, note_id: &str, owner: &str) -> NoteComment {
    NoteComment {
        id: id(comment_id),
        note_id: id(note_id),
        owner_id: user(owner),
        content: format!("comment from {owner}"),
        author_name: Some(owner.to_string()),
        created_at: Utc::now(),
    }
}

pub fn spot(spot_id: &str, owner: &str, capacity: u32, occupancy: u32) -> HangoutSpot {
    HangoutSpot {
        id: id(spot_id),
        owner_id: user(owner),
        name: format!("Spot {spot_id}"),
        description: String::new(),
        spot_type: "study".into(),
        location: GeoPoint::new(35.0, 135.0).unwrap(),
        capacity,
        current_occupancy: occupancy,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn checkin(checkin_id: &str, spot_id: &str, user_id: &str) -> HangoutCheckin {
    HangoutCheckin {
        id: id(checkin_id),
        spot_id: id(spot_id),
        user_id: user(user_id),
        user_name: None,
        checked_in_at: Utc::now(),
        checked_out_at: None,
        is_active: true,
    }
}

enum Response {
    Ready(Result<Record, AppError>),
    Gated(oneshot::Receiver<Result<Record, AppError>>),
}

/// 応答を事前に積んでおくクエリサービス。
///
/// `gate` で積んだ応答は送信側が値を送るまでリモート呼び出しを保留するため、
/// 呼び出し中の状態を観測できる。
pub struct StubQuery {
    lists: Mutex<Result<Vec<Record>, String>>,
    list_gate: Mutex<Option<oneshot::Receiver<()>>>,
    list_queries: Mutex<Vec<ListQuery>>,
    listed: Notify,
    records: Mutex<HashMap<EntityId, Record>>,
    liked: Mutex<Vec<EntityId>>,
    mutations: Mutex<Vec<MutationRequest>>,
    responses: Mutex<VecDeque<Response>>,
    mutated: Notify,
}

impl StubQuery {
    pub fn new() -> Self {
        Self {
            lists: Mutex::new(Ok(Vec::new())),
            list_gate: Mutex::new(None),
            list_queries: Mutex::new(Vec::new()),
            listed: Notify::new(),
            records: Mutex::new(HashMap::new()),
            liked: Mutex::new(Vec::new()),
            mutations: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
            mutated: Notify::new(),
        }
    }

    pub fn set_list(&self, records: Vec<Record>) {
        *self.lists.lock().unwrap() = Ok(records);
    }

    pub fn fail_lists(&self, message: &str) {
        *self.lists.lock().unwrap() = Err(message.to_string());
    }

    pub fn list_queries(&self) -> Vec<ListQuery> {
        self.list_queries.lock().unwrap().clone()
    }

    /// 次の一覧取得を、送信側が値を送るまで保留する
    pub fn hold_lists(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.list_gate.lock().unwrap() = Some(rx);
        tx
    }

    /// `count` 件の一覧取得が始まるまで待つ
    pub async fn wait_for_list_queries(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if self.list_queries.lock().unwrap().len() >= count {
                    return;
                }
                self.listed.notified().await;
            }
        })
        .await
        .expect("list was not requested");
    }

    pub fn put_record(&self, record: Record) {
        self.records
            .lock()
            .unwrap()
            .insert(record.id().clone(), record);
    }

    pub fn set_liked(&self, ids: Vec<EntityId>) {
        *self.liked.lock().unwrap() = ids;
    }

    pub fn respond(&self, result: Result<Record, AppError>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Response::Ready(result));
    }

    pub fn gate(&self) -> oneshot::Sender<Result<Record, AppError>> {
        let (tx, rx) = oneshot::channel();
        self.responses.lock().unwrap().push_back(Response::Gated(rx));
        tx
    }

    pub fn mutations(&self) -> Vec<MutationRequest> {
        self.mutations.lock().unwrap().clone()
    }

    /// `count` 件のミューテーションが発行されるまで待つ
    pub async fn wait_for_mutations(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if self.mutations.lock().unwrap().len() >= count {
                    return;
                }
                self.mutated.notified().await;
            }
        })
        .await
        .expect("mutation was not issued");
    }
}

#[async_trait]
impl QueryService for StubQuery {
    async fn fetch_list(&self, query: ListQuery) -> Result<Vec<Record>, AppError> {
        let resource = query.resource();
        self.list_queries.lock().unwrap().push(query);
        self.listed.notify_one();
        let gate = self.list_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let lists = self.lists.lock().unwrap().clone();
        lists
            .map(|records| {
                records
                    .into_iter()
                    .filter(|record| record.resource() == resource)
                    .collect()
            })
            .map_err(AppError::remote)
    }

    async fn fetch_one(&self, resource: ResourceKind, id: &EntityId) -> Result<Record, AppError> {
        self.records
            .lock()
            .unwrap()
            .get(id)
            .filter(|record| record.resource() == resource)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("{resource} {id}")))
    }

    async fn fetch_liked_note_ids(&self, _user_id: &UserId) -> Result<Vec<EntityId>, AppError> {
        Ok(self.liked.lock().unwrap().clone())
    }

    async fn mutate(&self, request: MutationRequest) -> Result<Record, AppError> {
        self.mutations.lock().unwrap().push(request);
        self.mutated.notify_one();
        let response = self.responses.lock().unwrap().pop_front();
        match response {
            Some(Response::Ready(result)) => result,
            Some(Response::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(AppError::remote("gate dropped"))),
            None => Err(AppError::remote("no response queued")),
        }
    }
}

/// フィルタに一致する購読者へ手動で通知を流すチャネル
pub struct StubChannel {
    subscribers: Mutex<Vec<(ResourceFilter, mpsc::UnboundedSender<ChangeMessage>)>>,
}

impl StubChannel {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn publish(&self, message: ChangeMessage) {
        for (filter, tx) in self.subscribers.lock().unwrap().iter() {
            if filter.matches(&message) {
                let _ = tx.send(message.clone());
            }
        }
    }

    /// まだ受信側が生きている購読のフィルタ
    pub fn open_filters(&self) -> Vec<ResourceFilter> {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .map(|(filter, _)| filter.clone())
            .collect()
    }
}

#[async_trait]
impl SubscriptionChannel for StubChannel {
    async fn subscribe(&self, filter: ResourceFilter) -> Result<Subscription, AppError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push((filter.clone(), tx));
        Ok(Subscription::new(filter, rx, || {}))
    }
}

pub struct StubAuth {
    tx: watch::Sender<Option<UserId>>,
}

impl StubAuth {
    pub fn signed_in(user_id: &str) -> Self {
        Self {
            tx: watch::channel(Some(user(user_id))).0,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            tx: watch::channel(None).0,
        }
    }

    pub fn switch(&self, user_id: Option<&str>) {
        self.tx.send_replace(user_id.map(user));
    }
}

impl AuthProvider for StubAuth {
    fn current_user(&self) -> Option<UserId> {
        self.tx.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<UserId>> {
        self.tx.subscribe()
    }
}
