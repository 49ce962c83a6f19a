/// View functions for the wizard, modals, and result panels
///
/// Pure functions from application state to widget trees. All mutation goes
/// through messages handled in `main.rs`.

use iced::widget::image as photo;
use iced::widget::{
    button, checkbox, column, container, pick_list, row, scrollable, stack, text, text_input,
    Canvas,
};
use iced::{Alignment, Color, ContentFit, Element, Length};

use crate::backend::SubmissionAck;
use crate::capture::ImageBuffer;
use crate::error::SelectionError;
use crate::measure::{PredictionMode, WeightPredictionResult};
use crate::selector::SelectorSession;
use crate::ui::selector_canvas::SelectionOverlay;
use crate::ui::{SELECTOR_CANVAS_HEIGHT, SELECTOR_CANVAS_WIDTH};
use crate::workflow::{Recommendation, StepId};
use crate::{App, CaptureTarget, Message};

const ERROR_COLOR: Color = Color::from_rgb(0.95, 0.45, 0.45);
const WARN_COLOR: Color = Color::from_rgb(0.98, 0.75, 0.35);
const OK_COLOR: Color = Color::from_rgb(0.45, 0.85, 0.55);

/// The whole wizard screen: header, step indicator, current panel, status
pub fn wizard_view(app: &App) -> Element<Message> {
    let current = app.wizard.current_step();

    let header = row![
        text("Herdcheck").size(26),
        text("Application ID").size(14),
        text_input("e.g. APP-2031", &app.application_id)
            .on_input(Message::ApplicationIdChanged)
            .width(Length::Fixed(220.0)),
    ]
    .spacing(12)
    .align_y(Alignment::Center);

    let indicator = row(StepId::ORDER
        .iter()
        .map(|step| {
            let marker = if app.wizard.is_step_complete(*step) {
                "✔"
            } else if *step == current {
                "▶"
            } else {
                "○"
            };
            text(format!("{marker} {}", step.title())).size(13).into()
        })
        .collect::<Vec<Element<Message>>>())
    .spacing(14);

    let panel: Element<Message> = match current {
        StepId::BasicInfo | StepId::Documents | StepId::Financial => {
            checklist_panel(app, current)
        }
        StepId::Animal => animal_panel(app),
        StepId::FinalReview => review_panel(app),
    };

    let mut body = column![header, indicator]
        .spacing(16)
        .padding(20)
        .width(Length::Fill);

    body = body.push(scrollable(panel).height(Length::Fill));

    if let Some(error) = &app.step_error {
        body = body.push(text(error.clone()).size(14).color(ERROR_COLOR));
    }

    body = body.push(navigation_row(app, current));
    body = body.push(text(&app.status).size(13));

    body.into()
}

/// Previous/Next controls; the final review submits instead of advancing
fn navigation_row(app: &App, current: StepId) -> Element<Message> {
    let at_first = current == StepId::ORDER[0];
    let previous = button(text("Previous").size(14))
        .style(button::secondary)
        .on_press_maybe((!at_first).then_some(Message::PreviousStep));

    let forward: Element<Message> = if current == StepId::FinalReview {
        if app.submitting {
            text("Submitting…").size(14).into()
        } else {
            button(text("Submit verification").size(14))
                .on_press(Message::SubmitDecision)
                .into()
        }
    } else {
        button(text("Next").size(14)).on_press(Message::NextStep).into()
    };

    row![previous, forward].spacing(12).into()
}

/// Simple attestation step: one checkbox per required item
fn checklist_panel(app: &App, step: StepId) -> Element<Message> {
    let mut items = column![text(step.title()).size(20)].spacing(10);
    for field in step.operator_checklist() {
        let field: &'static str = field;
        items = items.push(
            checkbox(label(field), app.draft_checked(step, field))
                .on_toggle(move |checked| Message::ChecklistToggled(step, field, checked)),
        );
    }
    items.into()
}

/// The animal step: side photos, estimation, muzzle pattern, checklist
fn animal_panel(app: &App) -> Element<Message> {
    let mut panel = column![text(StepId::Animal.title()).size(20)].spacing(14);

    // Side photos feeding the weight estimator
    panel = panel.push(
        row![
            photo_slot("Left side view", CaptureTarget::SideLeft, app.left_photo.as_ref()),
            photo_slot("Right side view", CaptureTarget::SideRight, app.right_photo.as_ref()),
        ]
        .spacing(20),
    );
    if let Some(error) = &app.capture_error {
        panel = panel.push(text(error.to_string()).size(13).color(ERROR_COLOR));
    }

    // Animal metadata for the remote estimator
    panel = panel.push(
        row![
            labeled_input("Breed", "Boran", &app.breed, Message::BreedChanged),
            labeled_input("Age (years)", "3", &app.age_input, Message::AgeChanged),
        ]
        .spacing(12),
    );

    // Estimation mode and manual measurements
    panel = panel.push(
        row![
            text("Estimation mode").size(14),
            pick_list(&PredictionMode::ALL[..], Some(app.mode), Message::ModeSelected),
        ]
        .spacing(10)
        .align_y(Alignment::Center),
    );

    if app.mode != PredictionMode::Ai {
        panel = panel.push(
            row![
                labeled_input("Heart girth (cm)", "180", &app.girth_input, Message::GirthChanged),
                labeled_input("Body length (cm)", "150", &app.length_input, Message::LengthChanged),
            ]
            .spacing(12),
        );
    }

    if app.estimating {
        panel = panel.push(text("Estimating weight…").size(14));
    } else {
        panel = panel.push(
            button(text("Predict weight").size(14)).on_press(Message::RunEstimate),
        );
    }
    if let Some(error) = &app.estimate_error {
        panel = panel.push(text(error.clone()).size(13).color(ERROR_COLOR));
    }
    if let Some(result) = &app.estimate {
        panel = panel.push(estimate_panel(result));
    }

    // Muzzle pattern enrollment
    panel = panel.push(text("Muzzle pattern (one loan per animal)").size(16));
    panel = panel.push(photo_slot(
        "Muzzle photo",
        CaptureTarget::Muzzle,
        app.muzzle_photo.as_ref(),
    ));
    panel = panel.push(
        button(text("Select muzzle region").size(13))
            .on_press_maybe(app.muzzle_photo.is_some().then_some(Message::OpenSelector)),
    );
    if app.pattern_busy {
        panel = panel.push(text("Checking pattern against enrolled animals…").size(13));
    }
    if let Some(error) = &app.pattern_error {
        panel = panel.push(
            column![
                text(error.clone()).size(13).color(ERROR_COLOR),
                text("Re-select the muzzle region to retry.").size(12),
            ]
            .spacing(2),
        );
    }
    if let Some(verdict) = &app.pattern_verdict {
        let line: Element<Message> = match verdict.duplicate_notice() {
            Some(notice) => text(notice).size(14).color(WARN_COLOR).into(),
            None => text(format!(
                "Pattern enrolled (confidence {:.0}%)",
                verdict.confidence * 100.0
            ))
            .size(13)
            .color(OK_COLOR)
            .into(),
        };
        panel = panel.push(line);
    }

    // Operator attestations for this step
    for field in StepId::Animal.operator_checklist() {
        let field: &'static str = field;
        panel = panel.push(
            checkbox(label(field), app.draft_checked(StepId::Animal, field))
                .on_toggle(move |checked| {
                    Message::ChecklistToggled(StepId::Animal, field, checked)
                }),
        );
    }

    panel.into()
}

/// Both estimates, their difference, the combined value, and remote notes.
/// Neither estimate is ever hidden in favor of the other.
fn estimate_panel(result: &WeightPredictionResult) -> Element<Message> {
    let mut rows = column![].spacing(4);

    if let Some(kg) = result.manual_weight_kg {
        rows = rows.push(text(format!("Manual (heart-girth formula): {kg:.1} kg")).size(14));
    }
    if let Some(kg) = result.ai_weight_kg {
        let confidence = result
            .confidence_score
            .map(|c| format!(" (confidence {:.0}%)", c * 100.0))
            .unwrap_or_default();
        rows = rows.push(text(format!("AI estimate: {kg:.1} kg{confidence}")).size(14));
    }
    if let Some(diff) = result.estimate_difference_kg() {
        rows = rows.push(text(format!("Difference between estimates: {diff:.1} kg")).size(13));
    }
    if let Some(kg) = result.combined_weight_kg {
        let agreement = result
            .agreement_score
            .map(|a| format!(", agreement {:.0}%", a * 100.0))
            .unwrap_or_default();
        rows = rows.push(text(format!("Combined: {kg:.1} kg{agreement}")).size(15));
    }
    for note in &result.processing_notes {
        rows = rows.push(text(format!("Service note: {note}")).size(12));
    }

    rows.into()
}

/// Terminal step: score readout, recommendation, consent gate, submit
fn review_panel(app: &App) -> Element<Message> {
    let mut panel = column![
        text(StepId::FinalReview.title()).size(20),
        text(format!("Verification score: {:.1} / 100", app.wizard.score())).size(16),
    ]
    .spacing(12);

    panel = panel.push(
        row![
            text("Recommendation").size(14),
            pick_list(
                &Recommendation::ALL[..],
                Some(app.recommendation),
                Message::RecommendationSelected,
            ),
        ]
        .spacing(10)
        .align_y(Alignment::Center),
    );

    panel = panel.push(
        checkbox("Loan terms explained to the applicant", app.terms_explained)
            .on_toggle(Message::TermsToggled),
    );
    panel = panel.push(
        checkbox(
            "Applicant consents to proceed (required for approval)",
            app.applicant_consents,
        )
        .on_toggle(Message::ConsentToggled),
    );

    if let Some(error) = app.wizard.last_submit_error() {
        panel = panel.push(text(error.to_string()).size(13).color(ERROR_COLOR));
    }

    panel.into()
}

/// Confirmation screen after the backend accepts the submission
pub fn submitted_view(ack: &SubmissionAck) -> Element<Message> {
    let mut panel = column![text("Verification submitted").size(28)]
        .spacing(10)
        .align_x(Alignment::Center);

    if let Some(reference) = &ack.reference {
        panel = panel.push(text(format!("Reference: {reference}")).size(16));
    }
    if let Some(message) = &ack.message {
        panel = panel.push(text(message.clone()).size(14));
    }
    panel = panel.push(
        text("The application now moves to manager review.").size(14),
    );

    container(panel)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}

/// Region selector modal: letterboxed photo with the canvas overlay on top
pub fn selector_modal<'a>(
    session: &'a SelectorSession,
    handle: &photo::Handle,
    error: Option<SelectionError>,
) -> Element<'a, Message> {
    let photo_layer = photo(handle.clone())
        .width(Length::Fixed(SELECTOR_CANVAS_WIDTH))
        .height(Length::Fixed(SELECTOR_CANVAS_HEIGHT))
        .content_fit(ContentFit::Contain);

    let overlay = Canvas::new(SelectionOverlay { session })
        .width(Length::Fixed(SELECTOR_CANVAS_WIDTH))
        .height(Length::Fixed(SELECTOR_CANVAS_HEIGHT));

    let viewport = stack(vec![
        Element::from(photo_layer),
        Element::from(overlay),
    ]);

    let readout: Element<Message> = match session.selected_dimensions() {
        Some((w, h)) => text(format!("Selected region: {w}×{h} px")).size(13).into(),
        None => text("Drag a rectangle around the muzzle").size(13).into(),
    };

    let mut panel = column![text("Isolate the muzzle").size(20), viewport, readout]
        .spacing(10)
        .align_x(Alignment::Center);

    if let Some(error) = error {
        panel = panel.push(text(error.to_string()).size(13).color(ERROR_COLOR));
    }

    panel = panel.push(
        row![
            button(text("Reset").size(13))
                .style(button::secondary)
                .on_press(Message::SelectorReset),
            button(text("Cancel").size(13))
                .style(button::secondary)
                .on_press(Message::SelectorCancel),
            button(text("Confirm selection").size(13)).on_press(Message::SelectorConfirm),
        ]
        .spacing(10),
    );

    backdrop(container(panel).padding(16).style(container::rounded_box).into())
}

/// Camera capture modal: live preview plus capture/cancel
pub fn camera_modal(preview: Option<&photo::Handle>) -> Element<'static, Message> {
    let viewport: Element<Message> = match preview {
        Some(handle) => photo(handle.clone())
            .width(Length::Fixed(SELECTOR_CANVAS_WIDTH))
            .height(Length::Fixed(SELECTOR_CANVAS_HEIGHT))
            .content_fit(ContentFit::Contain)
            .into(),
        None => container(text("Acquiring camera…").size(16))
            .width(Length::Fixed(SELECTOR_CANVAS_WIDTH))
            .height(Length::Fixed(SELECTOR_CANVAS_HEIGHT))
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into(),
    };

    let panel = column![
        text("Camera capture").size(20),
        viewport,
        row![
            button(text("Cancel").size(13))
                .style(button::secondary)
                .on_press(Message::CloseCamera),
            button(text("Capture photo").size(13)).on_press(Message::CaptureFrame),
        ]
        .spacing(10),
    ]
    .spacing(10)
    .align_x(Alignment::Center);

    backdrop(container(panel).padding(16).style(container::rounded_box).into())
}

/// Dimmed full-window backdrop centering modal content
fn backdrop(content: Element<Message>) -> Element<Message> {
    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .style(|_theme| container::Style {
            background: Some(iced::Background::Color(Color::from_rgba(0.0, 0.0, 0.0, 0.75))),
            ..container::Style::default()
        })
        .into()
}

/// One photo slot with thumbnail, picker, camera, and clear controls
fn photo_slot<'a>(
    title: &'a str,
    target: CaptureTarget,
    buffer: Option<&ImageBuffer>,
) -> Element<'a, Message> {
    let preview: Element<Message> = match buffer {
        Some(buf) => column![
            photo(photo::Handle::from_bytes(buf.bytes.clone()))
                .width(Length::Fixed(160.0))
                .height(Length::Fixed(120.0))
                .content_fit(ContentFit::Contain),
            text(format!("{}×{} px", buf.width, buf.height)).size(12),
        ]
        .spacing(4)
        .into(),
        None => text("No photo yet").size(12).into(),
    };

    column![
        text(title).size(14),
        preview,
        row![
            button(text("Browse…").size(12)).on_press(Message::PickPhoto(target)),
            button(text("Camera").size(12)).on_press(Message::OpenCamera(target)),
            button(text("Clear").size(12))
                .style(button::secondary)
                .on_press_maybe(buffer.is_some().then_some(Message::ClearPhoto(target))),
        ]
        .spacing(6),
    ]
    .spacing(6)
    .into()
}

fn labeled_input<'a>(
    label_text: &'a str,
    placeholder: &'a str,
    value: &'a str,
    on_input: fn(String) -> Message,
) -> Element<'a, Message> {
    column![
        text(label_text).size(13),
        text_input(placeholder, value)
            .on_input(on_input)
            .width(Length::Fixed(150.0)),
    ]
    .spacing(4)
    .into()
}

/// Human-readable form of a checklist field name
fn label(field: &str) -> String {
    let mut s = field.replace('_', " ");
    if let Some(first) = s.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    s
}
