pub mod analytics_session;
pub mod custom_event;
pub mod daily_stat;
pub mod daily_visitor;
pub mod event;
pub mod pixel_app;
pub mod pixel_settings;

pub use analytics_session::Entity as AnalyticsSessionEntity;
pub use custom_event::Entity as CustomEventEntity;
pub use daily_stat::Entity as DailyStatEntity;
pub use daily_visitor::Entity as DailyVisitorEntity;
pub use event::Entity as EventEntity;
pub use pixel_app::Entity as PixelAppEntity;
pub use pixel_settings::Entity as PixelSettingsEntity;
