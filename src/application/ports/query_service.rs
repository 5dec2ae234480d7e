use crate::domain::entities::{Entity, NoteDraft, NotePatch, Record, SpotDraft, SpotPatch};
use crate::domain::realtime::ResourceKind;
use crate::domain::value_objects::{EntityId, UserId};
use crate::shared::error::AppError;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteQuery {
    pub owner_id: Option<UserId>,
    /// 公開かつ承認済みのみ
    pub public_only: bool,
    pub subject: Option<String>,
    pub liked_by: Option<UserId>,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentQuery {
    pub note_id: EntityId,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotQuery {
    pub owner_id: Option<UserId>,
    pub active_only: bool,
    pub spot_type: Option<String>,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinQuery {
    pub spot_id: Option<EntityId>,
    pub user_id: Option<UserId>,
    pub active_only: bool,
    pub limit: u32,
}

/// 一覧取得の条件。結果は新しい順で返る
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListQuery {
    Notes(NoteQuery),
    Comments(CommentQuery),
    Spots(SpotQuery),
    Checkins(CheckinQuery),
}

impl ListQuery {
    pub fn resource(&self) -> ResourceKind {
        match self {
            ListQuery::Notes(_) => ResourceKind::Notes,
            ListQuery::Comments(_) => ResourceKind::NoteComments,
            ListQuery::Spots(_) => ResourceKind::HangoutSpots,
            ListQuery::Checkins(_) => ResourceKind::HangoutCheckins,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateNote(NoteDraft),
    UpdateNote { id: EntityId, patch: NotePatch },
    DeleteNote { id: EntityId },
    LikeNote { id: EntityId },
    UnlikeNote { id: EntityId },
    RecordNoteView { id: EntityId },
    CreateComment { note_id: EntityId, content: String },
    DeleteComment { id: EntityId },
    CreateSpot(SpotDraft),
    UpdateSpot { id: EntityId, patch: SpotPatch },
    DeleteSpot { id: EntityId },
    CheckIn { spot_id: EntityId },
    CheckOut { checkin_id: EntityId },
}

impl Mutation {
    pub fn label(&self) -> &'static str {
        match self {
            Mutation::CreateNote(_) => "create_note",
            Mutation::UpdateNote { .. } => "update_note",
            Mutation::DeleteNote { .. } => "delete_note",
            Mutation::LikeNote { .. } => "like_note",
            Mutation::UnlikeNote { .. } => "unlike_note",
            Mutation::RecordNoteView { .. } => "record_note_view",
            Mutation::CreateComment { .. } => "create_comment",
            Mutation::DeleteComment { .. } => "delete_comment",
            Mutation::CreateSpot(_) => "create_spot",
            Mutation::UpdateSpot { .. } => "update_spot",
            Mutation::DeleteSpot { .. } => "delete_spot",
            Mutation::CheckIn { .. } => "check_in",
            Mutation::CheckOut { .. } => "check_out",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    /// 実行ユーザー。サーバー側の認可に使う
    pub actor: Option<UserId>,
    pub mutation: Mutation,
}

impl MutationRequest {
    pub fn new(actor: Option<UserId>, mutation: Mutation) -> Self {
        Self { actor, mutation }
    }
}

/// 永続化・クエリを担う外部サービスのポート。
///
/// すべての呼び出しはサスペンションポイントであり、失敗時はメッセージ付きの
/// エラーを返す。認可や容量の最終判定はサービス側で行われる。
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn fetch_list(&self, query: ListQuery) -> Result<Vec<Record>, AppError>;

    async fn fetch_one(&self, resource: ResourceKind, id: &EntityId) -> Result<Record, AppError>;

    async fn fetch_liked_note_ids(&self, user_id: &UserId) -> Result<Vec<EntityId>, AppError>;

    /// ミューテーションを実行し、影響を受けたレコード（削除時は削除前の行）を返す
    async fn mutate(&self, request: MutationRequest) -> Result<Record, AppError>;
}

pub async fn fetch_entities<E: Entity>(
    service: &dyn QueryService,
    query: ListQuery,
) -> Result<Vec<E>, AppError> {
    service
        .fetch_list(query)
        .await?
        .into_iter()
        .map(E::from_record)
        .collect()
}

pub async fn fetch_entity<E: Entity>(
    service: &dyn QueryService,
    id: &EntityId,
) -> Result<E, AppError> {
    E::from_record(service.fetch_one(E::RESOURCE, id).await?)
}

pub async fn mutate_entity<E: Entity>(
    service: &dyn QueryService,
    request: MutationRequest,
) -> Result<E, AppError> {
    E::from_record(service.mutate(request).await?)
}
