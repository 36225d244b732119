use std::sync::Arc;

use tracing::{info, warn};

use call_notes_cell::{
    AssemblyAiClient, CompletionProvider, GroqClient, NoteGenerationPipeline, NoteService,
    NotesState, TranscriptionProvider,
};
use meeting_cell::{
    AppointmentReminderService, MeetingService, MissedMeetingSweeper, SweeperConfig,
};
use notification_cell::NotificationService;
use qr_link_cell::QrLinkService;
use shared_config::AppConfig;
use shared_database::{
    CallNoteRepository, MeetingRepository, NotificationRepository, ProfileRepository,
    QrTokenRepository,
};
use video_conferencing_cell::{TwilioTokenIssuer, VideoTokenIssuer};

/// Everything the routers and the background sweeper share. Built once at startup.
#[derive(Clone)]
pub struct AppServices {
    pub notifier: Arc<NotificationService>,
    pub video: Arc<dyn VideoTokenIssuer>,
    pub meetings: Arc<MeetingService>,
    pub notes: NotesState,
    pub qr: Arc<QrLinkService>,
    pub sweeper: Arc<MissedMeetingSweeper>,
}

impl AppServices {
    pub fn build<G>(config: &AppConfig, gateway: Arc<G>) -> Self
    where
        G: MeetingRepository
            + CallNoteRepository
            + NotificationRepository
            + QrTokenRepository
            + ProfileRepository
            + 'static,
    {
        let notifier = Arc::new(NotificationService::new(gateway.clone()));
        let video: Arc<dyn VideoTokenIssuer> = Arc::new(TwilioTokenIssuer::new(config));

        let transcriber: Option<Arc<dyn TranscriptionProvider>> = match AssemblyAiClient::new(config) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Transcription provider unavailable: {}", e);
                None
            }
        };
        let completer: Option<Arc<dyn CompletionProvider>> = match GroqClient::new(config) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Completion provider unavailable: {}", e);
                None
            }
        };

        let meetings = Arc::new(MeetingService::new(
            gateway.clone(),
            gateway.clone(),
            notifier.clone(),
            video.clone(),
        ));

        let notes = NotesState {
            pipeline: Arc::new(NoteGenerationPipeline::new(
                gateway.clone(),
                gateway.clone(),
                notifier.clone(),
                transcriber,
                completer.clone(),
            )),
            notes: Arc::new(NoteService::new(
                gateway.clone(),
                gateway.clone(),
                gateway.clone(),
                completer,
            )),
        };

        let qr = Arc::new(QrLinkService::new(
            gateway.clone(),
            gateway.clone(),
            notifier.clone(),
            config.frontend_url.clone(),
        ));

        let reminders =
            AppointmentReminderService::new(gateway.clone(), gateway.clone(), notifier.clone());
        let sweeper = Arc::new(
            MissedMeetingSweeper::new(
                gateway,
                notifier.clone(),
                SweeperConfig::with_interval_seconds(config.sweeper_interval_seconds),
            )
            .with_reminders(reminders),
        );

        info!("Services wired");

        Self {
            notifier,
            video,
            meetings,
            notes,
            qr,
            sweeper,
        }
    }
}
