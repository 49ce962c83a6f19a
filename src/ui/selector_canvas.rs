/// Canvas overlay for the region selector
///
/// Renders the rubber-band rectangle (dashed outline plus corner handles)
/// on top of the letterboxed muzzle photo and forwards pointer events to the
/// application as messages. All geometry and state live in the
/// `SelectorSession`; this overlay is a stateless view of it.

use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, LineDash, Path, Stroke};
use iced::{Color, Point, Rectangle, Renderer, Size, Theme};

use crate::selector::{SelectorPhase, SelectorSession};
use crate::Message;

/// Selection rectangle color
const ACCENT: Color = Color::from_rgb(0.35, 0.78, 0.98);

const HANDLE_RADIUS: f32 = 4.0;

pub struct SelectionOverlay<'a> {
    pub session: &'a SelectorSession,
}

impl<'a> canvas::Program<Message> for SelectionOverlay<'a> {
    type State = ();

    fn update(
        &self,
        _state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        match event {
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if let Some(position) = cursor.position_in(bounds) {
                    return (
                        canvas::event::Status::Captured,
                        Some(Message::SelectorDragStarted(position)),
                    );
                }
            }

            canvas::Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                if self.session.phase() == SelectorPhase::Dragging {
                    if let Some(position) = cursor.position_in(bounds) {
                        return (
                            canvas::event::Status::Captured,
                            Some(Message::SelectorDragMoved(position)),
                        );
                    }
                }
            }

            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                if self.session.phase() == SelectorPhase::Dragging {
                    return (
                        canvas::event::Status::Captured,
                        Some(Message::SelectorDragEnded),
                    );
                }
            }

            _ => {}
        }

        (canvas::event::Status::Ignored, None)
    }

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        if let Some(rect) = self.session.screen_rect() {
            let top_left = Point::new(rect.x, rect.y);
            let size = Size::new(rect.width, rect.height);

            let outline = Path::rectangle(top_left, size);
            frame.stroke(
                &outline,
                Stroke {
                    style: canvas::stroke::Style::Solid(ACCENT),
                    width: 2.0,
                    line_dash: LineDash {
                        segments: &[6.0, 4.0],
                        offset: 0,
                    },
                    ..Stroke::default()
                },
            );

            // Corner handles so the frozen selection reads as adjustable
            let corners = [
                top_left,
                Point::new(rect.x + rect.width, rect.y),
                Point::new(rect.x, rect.y + rect.height),
                Point::new(rect.x + rect.width, rect.y + rect.height),
            ];
            for corner in corners {
                frame.fill(&Path::circle(corner, HANDLE_RADIUS), ACCENT);
            }
        }

        vec![frame.into_geometry()]
    }

    fn mouse_interaction(
        &self,
        _state: &Self::State,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> mouse::Interaction {
        if cursor.is_over(bounds) {
            mouse::Interaction::Crosshair
        } else {
            mouse::Interaction::default()
        }
    }
}
