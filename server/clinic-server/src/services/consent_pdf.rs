//! Informed consent PDF
//!
//! Renders a letter-size document with the built-in Helvetica faces. Text is
//! in Spanish because the document is handed to patients as part of their
//! clinical record.

use std::io::BufWriter;

use anyhow::{anyhow, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference, Point,
};

const PAGE_WIDTH: f32 = 215.9;
const PAGE_HEIGHT: f32 = 279.4;
const LEFT_MARGIN: f32 = 25.0;
const RIGHT_MARGIN: f32 = PAGE_WIDTH - 25.0;
const TOP_MARGIN: f32 = PAGE_HEIGHT - 25.0;
const BOTTOM_MARGIN: f32 = 20.0;
const LEADING: f32 = 4.9;
const PT_TO_MM: f32 = 0.3528;

const EMPTY_SECTION: &str = "Sin información registrada.";
const MISSING_WITNESS: &str = "____________________________";

/// Everything printed on a consent document
#[derive(Debug, Clone)]
pub struct ConsentDocument {
    pub patient_name: String,
    pub patient_age: i32,
    pub patient_sex: String,
    pub patient_phone: String,
    pub doctor_name: String,
    pub specialty_name: Option<String>,
    pub appointment_kind: String,
    /// Appointment start in clinic local time
    pub scheduled_at: DateTime<FixedOffset>,
    pub primary_diagnosis: Option<String>,
    pub proposed_procedure: Option<String>,
    pub benefits: Option<String>,
    pub risks: Option<String>,
    pub alternatives: Option<String>,
    pub witness1_name: Option<String>,
    pub witness2_name: Option<String>,
    pub place: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub signed: bool,
}

impl ConsentDocument {
    /// Download file name for an appointment's consent
    pub fn file_name(appointment_id: uuid::Uuid) -> String {
        format!("consent_appointment_{}.pdf", appointment_id)
    }
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
}

/// Cursor over the pages of the document being written
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    fonts: Fonts,
    y: f32,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);
        let fonts = Fonts {
            regular: doc
                .add_builtin_font(BuiltinFont::Helvetica)
                .map_err(|e| anyhow!("PDF font error: {e}"))?,
            bold: doc
                .add_builtin_font(BuiltinFont::HelveticaBold)
                .map_err(|e| anyhow!("PDF font error: {e}"))?,
            italic: doc
                .add_builtin_font(BuiltinFont::HelveticaOblique)
                .map_err(|e| anyhow!("PDF font error: {e}"))?,
        };
        Ok(Self { doc, layer, fonts, y: TOP_MARGIN })
    }

    /// Start a new page unless `needed` millimetres remain above the bottom margin
    fn ensure_space(&mut self, needed: f32) {
        if self.y < BOTTOM_MARGIN + needed {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = TOP_MARGIN;
        }
    }

    fn text(&self, text: &str, size: f32, x: f32, font: &IndirectFontRef) {
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn centered(&self, text: &str, size: f32, font: &IndirectFontRef) {
        self.layer
            .use_text(text, size, Mm(centered_x(text, size, PAGE_WIDTH / 2.0)), Mm(self.y), font);
    }

    fn line(&mut self, text: &str) {
        self.text(text, 10.0, LEFT_MARGIN, &self.fonts.regular);
        self.y -= LEADING;
    }

    fn heading(&mut self, text: &str) {
        self.text(text, 11.0, LEFT_MARGIN, &self.fonts.bold);
        self.y -= 6.3;
    }

    fn paragraph(&mut self, text: &str, size: f32) {
        let per_line = chars_per_line(RIGHT_MARGIN - LEFT_MARGIN, size);
        for para in text.split('\n') {
            if para.trim().is_empty() {
                self.y -= LEADING;
                continue;
            }
            for line in wrap_text(para, per_line) {
                self.text(&line, size, LEFT_MARGIN, &self.fonts.regular);
                self.y -= LEADING;
            }
        }
    }

    fn section(&mut self, title: &str, content: Option<&str>) {
        self.ensure_space(28.0);
        self.heading(title);
        let content = content.map(str::trim).filter(|c| !c.is_empty()).unwrap_or(EMPTY_SECTION);
        self.paragraph(content, 10.0);
        self.y -= 2.8;
    }

    fn rectangle(&self, x: f32, top: f32, width: f32, height: f32) {
        let corners = [
            (x, top),
            (x + width, top),
            (x + width, top - height),
            (x, top - height),
        ];
        let line = Line {
            points: corners
                .iter()
                .map(|(px, py)| (Point::new(Mm(*px), Mm(*py)), false))
                .collect(),
            is_closed: true,
        };
        self.layer.add_line(line);
    }

    fn segment(&self, from: (f32, f32), to: (f32, f32)) {
        let line = Line {
            points: vec![
                (Point::new(Mm(from.0), Mm(from.1)), false),
                (Point::new(Mm(to.0), Mm(to.1)), false),
            ],
            is_closed: false,
        };
        self.layer.add_line(line);
    }

    fn finish(self) -> Result<Vec<u8>> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| anyhow!("PDF save error: {e}"))?;
        buf.into_inner().map_err(|e| anyhow!("PDF buffer error: {e}"))
    }
}

/// Approximate characters per line for Helvetica at `size` points
fn chars_per_line(width_mm: f32, size: f32) -> usize {
    let per_char = size * 0.55 * PT_TO_MM;
    let fitted = (width_mm / per_char).floor() as usize;
    fitted.max(40)
}

/// X position that roughly centers `text` on `center`
fn centered_x(text: &str, size: f32, center: f32) -> f32 {
    let width = text.chars().count() as f32 * size * 0.5 * PT_TO_MM;
    (center - width / 2.0).max(LEFT_MARGIN / 2.0)
}

/// Greedy word wrap on whitespace
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let current_len = current.chars().count();
        if current_len + word.chars().count() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Render the consent document to PDF bytes
pub fn render_consent_pdf(consent: &ConsentDocument) -> Result<Vec<u8>> {
    let mut page = PageWriter::new("Consentimiento informado")?;

    page.centered("CONSENTIMIENTO INFORMADO", 16.0, &page.fonts.bold);
    page.y -= 10.6;
    page.centered(
        "Documento de consentimiento informado para procedimientos y tratamientos médicos",
        10.0,
        &page.fonts.regular,
    );
    page.y -= 10.6;

    page.heading("Datos del paciente");
    page.line(&format!("Nombre: {}", consent.patient_name));
    page.line(&format!("Edad: {} años", consent.patient_age));
    page.line(&format!("Sexo: {}", consent.patient_sex));
    page.line(&format!("Teléfono: {}", consent.patient_phone));
    page.y -= 2.8;

    page.heading("Datos del profesional de la salud");
    page.line(&format!("Nombre: {}", consent.doctor_name));
    page.line(&format!(
        "Especialidad: {}",
        consent.specialty_name.as_deref().unwrap_or("N/A")
    ));
    page.line(&format!("Tipo de cita: {}", consent.appointment_kind));
    page.line(&format!(
        "Fecha y hora de la cita: {}",
        consent.scheduled_at.format("%d/%m/%Y %H:%M")
    ));
    page.y -= 3.5;

    let intro = format!(
        "Yo, {}, declaro que he sido informado(a) de manera clara, suficiente y comprensible \
         sobre mi estado de salud, el procedimiento propuesto y sus implicaciones, y que he \
         tenido oportunidad de hacer preguntas y obtener respuestas satisfactorias.",
        consent.patient_name
    );
    page.paragraph(&intro, 10.0);
    page.y -= 3.5;

    page.section("Diagnóstico principal", consent.primary_diagnosis.as_deref());
    page.section("Procedimiento propuesto", consent.proposed_procedure.as_deref());
    page.section("Beneficios esperados", consent.benefits.as_deref());
    page.section("Riesgos y posibles complicaciones", consent.risks.as_deref());
    page.section("Alternativas disponibles", consent.alternatives.as_deref());

    page.ensure_space(35.0);
    page.heading("Testigos");
    let witness = |name: &Option<String>| {
        name.as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(MISSING_WITNESS)
            .to_string()
    };
    page.line(&format!("Testigo 1: {}", witness(&consent.witness1_name)));
    page.line(&format!("Testigo 2: {}", witness(&consent.witness2_name)));
    page.y -= 5.6;

    page.line(&format!("Lugar: {}", consent.place));
    page.line(&format!("Fecha: {}", consent.date.format("%d/%m/%Y")));
    page.line(&format!("Hora: {}", consent.time.format("%H:%M")));
    page.y -= 5.6;

    page.ensure_space(42.0);
    page.heading("Firma del paciente");

    let box_width = 80.0;
    let box_height = 30.0;
    let top = page.y;
    page.layer.set_outline_thickness(1.0);
    page.rectangle(LEFT_MARGIN, top, box_width, box_height);

    if consent.signed {
        page.y = top - 12.0;
        let marker = "Firmado electrónicamente";
        page.layer.use_text(
            marker,
            10.0,
            Mm(centered_x(marker, 10.0, LEFT_MARGIN + box_width / 2.0)),
            Mm(page.y),
            &page.fonts.italic,
        );
    }

    let guide_y = top - box_height + 6.0;
    page.segment((LEFT_MARGIN + 3.0, guide_y), (LEFT_MARGIN + box_width - 3.0, guide_y));
    let caption = "Nombre y firma del paciente";
    page.layer.use_text(
        caption,
        9.0,
        Mm(centered_x(caption, 9.0, LEFT_MARGIN + box_width / 2.0)),
        Mm(top - box_height + 2.0),
        &page.fonts.regular,
    );
    page.y = top - box_height - 7.0;

    let note = "Este documento de consentimiento informado forma parte del expediente clínico \
                del paciente y ha sido emitido electrónicamente.";
    let per_line = chars_per_line(RIGHT_MARGIN - LEFT_MARGIN, 8.0);
    let mut note_y = BOTTOM_MARGIN;
    for line in wrap_text(note, per_line) {
        page.layer
            .use_text(line, 8.0, Mm(LEFT_MARGIN), Mm(note_y), &page.fonts.italic);
        note_y -= 3.5;
    }

    page.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn document() -> ConsentDocument {
        let offset = FixedOffset::east_opt(-6 * 3600).unwrap();
        ConsentDocument {
            patient_name: "María López".to_string(),
            patient_age: 34,
            patient_sex: "Femenino".to_string(),
            patient_phone: "7551234567".to_string(),
            doctor_name: "Ana Ruiz".to_string(),
            specialty_name: Some("Dermatología".to_string()),
            appointment_kind: "Primera vez".to_string(),
            scheduled_at: offset.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap(),
            primary_diagnosis: Some("Acné vulgar".to_string()),
            proposed_procedure: None,
            benefits: None,
            risks: Some("Irritación local. ".repeat(60)),
            alternatives: None,
            witness1_name: None,
            witness2_name: Some("Luis Pérez".to_string()),
            place: "Zihuatanejo, Guerrero".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            signed: true,
        }
    }

    #[test]
    fn test_render_produces_pdf() {
        let bytes = render_consent_pdf(&document()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 1000);
    }

    #[test]
    fn test_render_unsigned_empty_consent() {
        let mut doc = document();
        doc.signed = false;
        doc.primary_diagnosis = None;
        doc.risks = None;
        assert!(render_consent_pdf(&doc).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn test_wrap_text() {
        let lines = wrap_text("uno dos tres cuatro cinco", 9);
        assert_eq!(lines, vec!["uno dos", "tres", "cuatro", "cinco"]);
        assert!(wrap_text("   ", 10).is_empty());
    }

    #[test]
    fn test_file_name() {
        let id = uuid::Uuid::nil();
        assert_eq!(
            ConsentDocument::file_name(id),
            "consent_appointment_00000000-0000-0000-0000-000000000000.pdf"
        );
    }
}
