pub mod checkin;
pub mod post;
pub mod resource;
pub mod user;

pub use checkin::{CheckIn, CheckinSummary, CreateCheckinRequest, TrendPoint};
pub use post::{Comment, CreateCommentRequest, CreatePostRequest, ForumPost, PostCategory, PostEvent};
pub use resource::{
    AggregationPhase, AuthAction, ContentItem, ResourceSnapshot, SourceKind, SpotifyToken,
};
pub use user::{AuthResponse, CreateUserRequest, LoginRequest, User, UserInfo};
