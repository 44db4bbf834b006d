/// A tracing layer that forwards WARN and ERROR events to the UI log strip.
use crate::display::{DisplayUpdate, RedrawQueue};

pub struct UiLogLayer {
    redraw: RedrawQueue,
}

impl UiLogLayer {
    pub fn new(redraw: RedrawQueue) -> Self {
        Self { redraw }
    }
}

impl<S> tracing_subscriber::Layer<S> for UiLogLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        // Only WARN and ERROR, to keep the queue for real updates
        let level = event.metadata().level();
        if !matches!(*level, tracing::Level::WARN | tracing::Level::ERROR) {
            return;
        }

        let mut message = format!("{} [{}] ", chrono::Local::now().format("%H:%M:%S"), level);
        let mut visitor = MessageVisitor(&mut message);
        event.record(&mut visitor);

        self.redraw.enqueue(DisplayUpdate::Log(message));
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl<'a> tracing::field::Visit for MessageVisitor<'a> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}
