//! The canonical cough survey: welcome, cough recording, questionnaire and
//! thank-you segments.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::registry::{
    BranchRule, ProgressMeta, RecordingMeta, StepDescriptor, StepMetadata, StepRegistry, ViewKind,
};
use super::validation::{FieldSpec, StepSchema, as_number};

pub const WELCOME_BASE: &str = "/welcome";
pub const SUBMIT_BASE: &str = "/submit-steps";

/// Route of the first recording screen, where the welcome segment hands off.
pub const RECORD_ROUTE: &str = "/submit-steps/step-record/cough";
pub const MANUAL_UPLOAD_ROUTE: &str = "/submit-steps/step-manual-upload/cough";
pub const LISTEN_ROUTE: &str = "/submit-steps/step-listen/cough";
pub const THANK_YOU_ROUTE: &str = "/submit-steps/thank-you";

pub const QUESTIONNAIRE_TOTAL: u32 = 16;

/// Questionnaire step holding the smoking-history question.
pub const SMOKING_STEP: u32 = 5;
/// Where "never smoked" lands, skipping the smoking-detail screens.
pub const SMOKING_SKIP_TARGET: u32 = 9;
pub const NEVER_SMOKED: &str = "No, I have never smoked";

const RECORD_LOGIC: &str = "recordYourCough";

static POSTAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 \-]{1,9}$").unwrap());
static AUDIO_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(wav|mp3|ogg|webm|m4a|flac)$").unwrap());

/// Store key for a step slug inside a namespace.
pub fn store_key(namespace: &str, slug: &str) -> String {
    format!("{namespace}:{slug}")
}

/// Route of questionnaire screen `n` (1-based).
pub fn questionnaire_route(n: u32) -> String {
    format!("{SUBMIT_BASE}/questionary/step{n}")
}

/// Every survey step in order: welcome segment, then the submit steps.
pub fn survey_steps(namespace: &str) -> Vec<StepDescriptor> {
    let mut steps = welcome_steps(namespace);
    steps.extend(submit_steps(namespace));
    steps
}

/// The full survey registry, without re-running construction checks.
pub fn survey_registry(namespace: &str) -> StepRegistry {
    StepRegistry::from_trusted(survey_steps(namespace))
}

/// The full survey registry with route and target checks applied.
pub fn checked_survey_registry(namespace: &str) -> crate::error::Result<StepRegistry> {
    Ok(StepRegistry::new(survey_steps(namespace))?)
}

/// Welcome segment: splash, introduction, consent, recording instructions.
pub fn welcome_steps(namespace: &str) -> Vec<StepDescriptor> {
    vec![
        StepDescriptor::new(WELCOME_BASE, "", ViewKind::Splash, &store_key(namespace, "welcome"))
            .with_title("Welcome")
            .with_next("/welcome/step-2")
            .with_schema(StepSchema::new(vec![
                FieldSpec::choice("language", "Language", &["en", "es"]),
                FieldSpec::text("country", "Country of residence"),
            ])),
        StepDescriptor::new(
            WELCOME_BASE,
            "/step-2",
            ViewKind::Introduction,
            &store_key(namespace, "introduction"),
        )
        .with_title("About this study")
        .with_previous(WELCOME_BASE)
        .with_next("/welcome/step-3"),
        StepDescriptor::new(
            WELCOME_BASE,
            "/step-3",
            ViewKind::Consent,
            &store_key(namespace, "consent"),
        )
        .with_title("Consent")
        .with_previous("/welcome/step-2")
        .with_next("/welcome/step-4")
        .with_schema(StepSchema::new(vec![
            FieldSpec::accept(
                "agreedConsentTerms",
                "I certify that I am at least 18 years old and agree to the terms of this Consent Form",
            ),
            FieldSpec::accept("agreedPolicyTerms", "I agree to the terms of the Privacy Policy"),
            FieldSpec::accept(
                "agreedCovidDetection",
                "I agree that my data is processed for respiratory disease detection research",
            ),
            FieldSpec::accept(
                "agreedCovidCollection",
                "I agree to the collection of my cough recordings",
            ),
        ])),
        StepDescriptor::new(
            WELCOME_BASE,
            "/step-4",
            ViewKind::RecordingInstructions,
            &store_key(namespace, "instructions"),
        )
        .with_title("Before you record")
        .with_previous("/welcome/step-3")
        .with_next(RECORD_ROUTE),
    ]
}

/// Submit steps: cough recording, questionnaire, thank-you.
pub fn submit_steps(namespace: &str) -> Vec<StepDescriptor> {
    let mut steps = cough_steps(namespace);
    steps.extend(questionnaire_steps(namespace));
    steps.push(
        StepDescriptor::new(
            SUBMIT_BASE,
            "/thank-you",
            ViewKind::ThankYou,
            &store_key(namespace, "submission"),
        )
        .with_title("Thank you")
        .with_previous(&questionnaire_route(QUESTIONNAIRE_TOTAL)),
    );
    steps
}

fn recording_schema() -> StepSchema {
    StepSchema::new(vec![
        FieldSpec::pattern("recordingFile", "Recording file", AUDIO_FILE.clone())
            .with_message("Unsupported audio format"),
        FieldSpec::number("durationSeconds", "Duration in seconds", Some(3.0), Some(30.0)),
    ])
}

/// Record, manual upload and listen share one store key: they all edit the
/// same recording answer.
fn cough_steps(namespace: &str) -> Vec<StepDescriptor> {
    let key = store_key(namespace, RECORD_LOGIC);
    let recording = |manual_upload: Option<&str>| {
        StepMetadata::Recording(RecordingMeta {
            logic: RECORD_LOGIC.to_string(),
            manual_upload: manual_upload.map(str::to_string),
        })
    };
    vec![
        StepDescriptor::new(SUBMIT_BASE, "/step-record/cough", ViewKind::RecordCough, &key)
            .with_title("Record your cough")
            .with_previous("/welcome/step-4")
            .with_next(LISTEN_ROUTE)
            .with_metadata(recording(Some(MANUAL_UPLOAD_ROUTE)))
            .with_schema(recording_schema()),
        StepDescriptor::new(
            SUBMIT_BASE,
            "/step-manual-upload/cough",
            ViewKind::ManualUpload,
            &key,
        )
        .with_title("Upload your cough")
        .with_previous(RECORD_ROUTE)
        .with_next(LISTEN_ROUTE)
        .with_metadata(recording(None))
        .with_schema(recording_schema()),
        StepDescriptor::new(SUBMIT_BASE, "/step-listen/cough", ViewKind::ListenAudio, &key)
            .with_title("Listen to your cough")
            .with_previous(RECORD_ROUTE)
            .with_next(&questionnaire_route(1))
            .with_metadata(recording(None))
            .with_schema(recording_schema()),
    ]
}

struct Question {
    slug: &'static str,
    title: &'static str,
    schema: StepSchema,
}

fn questionnaire_steps(namespace: &str) -> Vec<StepDescriptor> {
    let questions = questions();
    debug_assert_eq!(questions.len(), QUESTIONNAIRE_TOTAL as usize);

    questions
        .into_iter()
        .zip(1..)
        .map(|(question, n): (Question, u32)| {
            let previous = if n == 1 {
                LISTEN_ROUTE.to_string()
            } else {
                questionnaire_route(n - 1)
            };
            let next = if n == QUESTIONNAIRE_TOTAL {
                THANK_YOU_ROUTE.to_string()
            } else {
                questionnaire_route(n + 1)
            };
            let branch = (n == SMOKING_STEP).then(|| BranchRule {
                field: "isSmoking".to_string(),
                equals: NEVER_SMOKED.to_string(),
                target: questionnaire_route(SMOKING_SKIP_TARGET),
            });
            StepDescriptor::new(
                SUBMIT_BASE,
                &format!("/questionary/step{n}"),
                ViewKind::Question,
                &store_key(namespace, question.slug),
            )
            .with_title(question.title)
            .with_previous(&previous)
            .with_next(&next)
            .with_metadata(StepMetadata::Progress(ProgressMeta {
                current: n,
                total: QUESTIONNAIRE_TOTAL,
                branch,
            }))
            .with_schema(question.schema)
        })
        .collect()
}

fn questions() -> Vec<Question> {
    vec![
        Question {
            slug: "age-gender",
            title: "About you",
            schema: StepSchema::new(vec![
                FieldSpec::choice(
                    "age",
                    "Age",
                    &["<18 years", "18-45", "45-65", ">65", "Decline to answer"],
                ),
                FieldSpec::multi_choice(
                    "gender",
                    "Gender",
                    &["Female", "Male", "Transgender", "Other"],
                    1,
                ),
            ]),
        },
        Question {
            slug: "sex",
            title: "Sex assigned at birth",
            schema: StepSchema::new(vec![FieldSpec::choice(
                "sex",
                "Sex",
                &["Female", "Male", "Decline to answer"],
            )]),
        },
        Question {
            slug: "location",
            title: "Where do you live?",
            schema: StepSchema::new(vec![
                FieldSpec::pattern("zipCode", "Postal code", POSTAL_CODE.clone())
                    .with_message("Enter a valid postal code"),
            ]),
        },
        Question {
            slug: "illness",
            title: "Are you ill?",
            schema: StepSchema::new(vec![FieldSpec::choice(
                "illStatus",
                "Do you currently feel ill?",
                &["yes", "no", "unsure"],
            )]),
        },
        Question {
            slug: "smoking",
            title: "Smoking history",
            schema: StepSchema::new(vec![
                FieldSpec::choice(
                    "isSmoking",
                    "Do you smoke?",
                    &["Yes, current smoker", "Yes, in the past", NEVER_SMOKED],
                ),
            ]),
        },
        Question {
            slug: "smoking-type",
            title: "What do you smoke?",
            schema: StepSchema::new(vec![FieldSpec::multi_choice(
                "typeSmoking",
                "Type of smoking",
                &["Cigarettes", "Cigars", "Pipe", "E-cigarettes or vape", "Hookah", "Other"],
                1,
            )]),
        },
        Question {
            slug: "smoking-frequency",
            title: "How much do you smoke?",
            schema: StepSchema::new(vec![FieldSpec::choice(
                "freqSmoking",
                "Amount smoked",
                &[
                    "1-10 cigarettes (< than one packet per day)",
                    "One packet per day (20 cigarettes)",
                    "1-2 packets per day",
                    "More than two packets per day",
                    "I don't smoke/didn't smoke regularly",
                ],
            )]),
        },
        Question {
            slug: "smoking-years",
            title: "For how long?",
            schema: StepSchema::new(vec![FieldSpec::choice(
                "yearsSmoked",
                "Years smoked",
                &[
                    "Less than one year",
                    "1 to 3 years",
                    "3 to 6 years",
                    "6 to 10 years",
                    "> 10 years",
                ],
            )]),
        },
        Question {
            slug: "symptoms",
            title: "Symptoms",
            schema: StepSchema::new(vec![FieldSpec::multi_choice(
                "symptoms",
                "Which symptoms do you have?",
                &[
                    "A persistent chest cough with phlegm that does not go away",
                    "Frequent chest infections",
                    "Wheezing",
                    "Weight loss",
                    "Tiredness",
                    "Swollen ankles from a build-up of fluid (oedema)",
                    "Chest pain",
                    "Coughing up blood",
                    "None",
                    "Other",
                ],
                1,
            )])
            .with_check("symptoms", "\"None\" cannot be combined with other symptoms", |f| {
                none_is_exclusive(f, "symptoms")
            }),
        },
        Question {
            slug: "exposure",
            title: "Occupational exposure",
            schema: StepSchema::new(vec![FieldSpec::multi_choice(
                "exposure",
                "Have you been exposed to any of these?",
                &[
                    "Cadmium dust and fumes",
                    "Exposure to biomass smoke from cooking fires",
                    "Grain and flour dust",
                    "Silica dust",
                    "Welding fumes",
                    "Isocyanates",
                    "Coal dust",
                    "Other",
                ],
                1,
            )]),
        },
        Question {
            slug: "copd-stage",
            title: "Lung function",
            schema: StepSchema::new(vec![
                FieldSpec::choice(
                    "COPDstage",
                    "COPD stage",
                    &[
                        "GOLD I - mild: FEV1 ≥80% predicted",
                        "GOLD II - moderate: 50% ≤ FEV1 <80%",
                        "GOLD III - severe: 30% ≤ FEV1 <50% predicted",
                        "GOLD IV - very severe: FEV1 <30% predicted",
                    ],
                ),
                FieldSpec::number("FEV1", "FEV1 (litres)", Some(0.0), Some(10.0)),
                FieldSpec::number("FVC", "FVC (litres)", Some(0.1), Some(10.0)),
                FieldSpec::number("ratio", "FEV1/FVC ratio", Some(0.0), Some(1.0)),
            ])
            .with_check("ratio", "Ratio must match FEV1/FVC", ratio_matches),
        },
        Question {
            slug: "exacerbations",
            title: "Exacerbations",
            schema: StepSchema::new(vec![FieldSpec::choice(
                "COPDExacerbations",
                "How often do your symptoms get worse?",
                &[
                    "Yes, once in every 3 months",
                    "None",
                    "more than 2 per year",
                    "1-2 per year",
                    "severe exacerbation requiring hospitalization",
                    "never",
                    "notSure",
                    "Others",
                ],
            )]),
        },
        Question {
            slug: "hospitalization",
            title: "Treatment",
            schema: StepSchema::new(vec![
                FieldSpec::choice(
                    "numHospitalized",
                    "How often are attacks treated in hospital?",
                    &["Rarely", "Sometimes", "Half of the time", "Most often", "Every time"],
                ),
                FieldSpec::choice(
                    "compliance",
                    "Do you follow your prescribed treatment?",
                    &["Non-compliant", "Sometimes", "Compliant"],
                ),
            ]),
        },
        Question {
            slug: "conditions",
            title: "Medical conditions",
            schema: StepSchema::new(vec![FieldSpec::multi_choice(
                "conditions",
                "Do you have any of these conditions?",
                &[
                    "None",
                    "Allergies",
                    "Asthma",
                    "Bronchitis",
                    "Congestive heart failure",
                    "COPD/emphysema",
                    "Extreme obesity",
                    "Heart disease",
                    "HIV, AIDS, or impaired immune system",
                    "Other chronic lung disease",
                    "Pneumonia",
                    "Pulmonary fibrosis",
                    "Sinusitis",
                    "Tuberculosis",
                    "Hypertension",
                    "Hypothyroidism",
                    "Family member has or had suffered from a respiratory disease",
                    "Other",
                ],
                1,
            )])
            .with_check("conditions", "\"None\" cannot be combined with other conditions", |f| {
                none_is_exclusive(f, "conditions")
            }),
        },
        Question {
            slug: "education",
            title: "Education",
            schema: StepSchema::new(vec![FieldSpec::multi_choice(
                "education",
                "Highest level of education",
                &[
                    "No formal education",
                    "Primary school",
                    "Secondary school",
                    "High School",
                    "College/University degree",
                    "Postgraduate degree",
                ],
                1,
            )]),
        },
        Question {
            slug: "residential-area",
            title: "Residential area",
            schema: StepSchema::new(vec![FieldSpec::text(
                "residentialArea",
                "Describe the area you live in",
            )]),
        },
    ]
}

/// A "None" option must be the only selection.
fn none_is_exclusive(form: &Map<String, Value>, field: &str) -> bool {
    match form.get(field).and_then(Value::as_array) {
        Some(items) => items.len() <= 1 || !items.iter().any(|v| v.as_str() == Some("None")),
        None => true,
    }
}

/// FEV1/FVC must agree with the entered ratio within 0.05.
fn ratio_matches(form: &Map<String, Value>) -> bool {
    let get = |name: &str| form.get(name).and_then(as_number);
    match (get("FEV1"), get("FVC"), get("ratio")) {
        (Some(fev1), Some(fvc), Some(ratio)) if fvc > 0.0 => (fev1 / fvc - ratio).abs() <= 0.05,
        _ => false,
    }
}

/// Country chosen on the welcome splash, if answered.
pub fn country_of(record: &crate::store::AnswerRecord, namespace: &str) -> Option<String> {
    record
        .get(&store_key(namespace, "welcome"))
        .and_then(|v| v.get("country"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
