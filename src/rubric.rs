//! Static grading definitions: service rubrics, practical exam rubrics,
//! score levels, course modules and the academic instrument weights.

use crate::model::ExamType;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RubricItem {
    pub id: &'static str,
    pub text: &'static str,
    pub points: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RubricKind {
    Group,
    Individual,
}

impl RubricKind {
    pub fn items(self) -> &'static [RubricItem] {
        match self {
            Self::Group => GROUP_EVALUATION_ITEMS,
            Self::Individual => INDIVIDUAL_EVALUATION_ITEMS,
        }
    }

    pub fn find(self, item_id: &str) -> Option<&'static RubricItem> {
        self.items().iter().find(|i| i.id == item_id)
    }

    pub fn max_total(self) -> f64 {
        self.items().iter().map(|i| i.points).sum()
    }
}

pub const GROUP_EVALUATION_ITEMS: &[RubricItem] = &[
    RubricItem {
        id: "g1",
        text: "Planifica y organiza correctamente la mise en place, asegurando que todos los ingredientes, utensilios y herramientas estén listos antes de comenzar.",
        points: 1.0,
    },
    RubricItem {
        id: "g2",
        text: "Selecciona, manipula y conserva los ingredientes de forma adecuada, garantizando su frescura, calidad y correcta utilización durante todo el proceso de elaboración.",
        points: 1.5,
    },
    RubricItem {
        id: "g3",
        text: "Controla y ajusta los tiempos de cocción para asegurar que todos los elementos del plato estén en su punto exacto al momento del servicio.",
        points: 1.0,
    },
    RubricItem {
        id: "g4",
        text: "Mantiene en todo momento las normas de higiene y seguridad alimentaria, asegurando un entorno de trabajo limpio y una correcta manipulación de los alimentos.",
        points: 1.5,
    },
    RubricItem {
        id: "g5",
        text: "Coordina de forma eficiente el trabajo con tus compañeros, asegurando que la preparación de los platos se realice de manera sincronizada y a tiempo.",
        points: 1.0,
    },
    RubricItem {
        id: "g6",
        text: "Identifica los errores cometidos durante el proceso de elaboración y plantea posibles soluciones para mejorar en futuras ocasiones.",
        points: 1.0,
    },
    RubricItem {
        id: "g7",
        text: "¿Ha sido capaz de trabajar en equipo y con actitud activa participativa?",
        points: 1.0,
    },
    RubricItem {
        id: "g8",
        text: "Gestiona los ingredientes sobrantes de forma adecuada, minimizando el desperdicio y aprovechando los productos de manera eficiente.",
        points: 2.0,
    },
];

pub const INDIVIDUAL_EVALUATION_ITEMS: &[RubricItem] = &[
    RubricItem {
        id: "i1",
        text: "¿Ha realizado operaciones de puesta en marcha de maquinaria y equipos siguiendo los procedimientos establecidos por el profesor?",
        points: 0.5,
    },
    RubricItem {
        id: "i2",
        text: "¿Ha realizado las operaciones de mise-enplace utilizando correctamente útiles y/o herramientas, siguiendo los procedimientos establecidos por el profesor?",
        points: 1.0,
    },
    RubricItem {
        id: "i3",
        text: "¿Ha sido capaz de Interpretar las fichas técnicas o documentación necesaria para las elaboraciones que le han tocado desarrollar?",
        points: 1.5,
    },
    RubricItem {
        id: "i4",
        text: "¿Ha asistido con el material requerido (fichas técnicas, herramientas y utensilios propios) para el desarrollo de sus prácticas diarias?",
        points: 1.0,
    },
    RubricItem {
        id: "i5",
        text: "¿Ha sido capaz de ejecutar las tareas siguiendo los procedimientos establecidos por el profesor, aplicando las técnicas idóneas en función de las prácticas a realizar?",
        points: 1.0,
    },
    RubricItem {
        id: "i6",
        text: "¿Ha sido capaz de trabajar de forma limpia y ordenada durante el desarrollo de las prácticas en el taller aplicando los procedimientos establecidos?",
        points: 1.0,
    },
    RubricItem {
        id: "i7",
        text: "¿Ha sido capaz de trabajar en equipo y con actitud activa participativa?",
        points: 1.5,
    },
    RubricItem {
        id: "i8",
        text: "¿Ha sido capaz de aplicar las técnicas idóneas de conservación de los productos trabajados en el taller hasta el momento de su utilización?",
        points: 0.5,
    },
    RubricItem {
        id: "i9",
        text: "¿Ha sido capaz de realizar las operaciones de mantenimiento y limpieza de la maquinaria y equipos utilizados, cumplimentando los registros asociados?",
        points: 1.0,
    },
    RubricItem {
        id: "i10",
        text: "¿El alumno cuida su higiene personal y asiste con el uniforme completo, limpio y planchado?",
        points: 1.0,
    },
];

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScoreLevel {
    pub label: &'static str,
    pub value: f64,
}

/// Levels a practical exam criterion can be scored at.
pub const SCORE_LEVELS: &[ScoreLevel] = &[
    ScoreLevel { label: "Excelente", value: 10.0 },
    ScoreLevel { label: "Notable", value: 8.0 },
    ScoreLevel { label: "Aprobado", value: 5.0 },
    ScoreLevel { label: "Insuficiente", value: 2.0 },
];

pub fn is_score_level(v: f64) -> bool {
    SCORE_LEVELS.iter().any(|l| l.value == v)
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ExamCriterion {
    pub id: &'static str,
    pub text: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResultArea {
    pub id: &'static str,
    pub title: &'static str,
    pub weight: f64,
    pub criteria: &'static [ExamCriterion],
}

pub const PRACTICAL_EXAM_RUBRIC_T1: &[ResultArea] = &[
    ResultArea {
        id: "ra1",
        title: "R.A.1 – Organización de procesos",
        weight: 0.20,
        criteria: &[
            ExamCriterion { id: "ra1c1", text: "Planificación y mise en place" },
            ExamCriterion { id: "ra1c2", text: "Orden, limpieza y conservación" },
        ],
    },
    ResultArea {
        id: "ra2",
        title: "R.A.2 – Técnicas culinarias tradicionales y avanzadas",
        weight: 0.30,
        criteria: &[
            ExamCriterion { id: "ra2c1", text: "Aplicación de técnicas básicas" },
            ExamCriterion { id: "ra2c2", text: "Aplicación de técnicas avanzadas" },
            ExamCriterion { id: "ra2c3", text: "Evaluación del resultado final" },
        ],
    },
    ResultArea {
        id: "ra3",
        title: "R.A.3 – Elaboración a partir de materias primas",
        weight: 0.30,
        criteria: &[
            ExamCriterion { id: "ra3c1", text: "Creatividad y propuestas" },
            ExamCriterion { id: "ra3c2", text: "Aprovechamiento de recursos" },
            ExamCriterion { id: "ra3c3", text: "Organización y ejecución" },
        ],
    },
    ResultArea {
        id: "ra4",
        title: "R.A.4 – Necesidades alimenticias específicas",
        weight: 0.20,
        criteria: &[
            ExamCriterion { id: "ra4c1", text: "Identificación y selección de alimentos" },
            ExamCriterion { id: "ra4c2", text: "Prevención de contaminación cruzada" },
            ExamCriterion { id: "ra4c3", text: "Resultado final y justificación" },
        ],
    },
];

pub const PRACTICAL_EXAM_RUBRIC_T2: &[ResultArea] = &[
    ResultArea {
        id: "ra1",
        title: "R.A.1 – Organización",
        weight: 0.20,
        criteria: &[
            ExamCriterion { id: "ra1c1", text: "Planificación y mise en place" },
            ExamCriterion { id: "ra1c2", text: "Preparación de materias primas y utensilios" },
            ExamCriterion { id: "ra1c3", text: "Orden, limpieza y seguridad" },
            ExamCriterion { id: "ra1c4", text: "Conservación intermedia" },
        ],
    },
    ResultArea {
        id: "ra2",
        title: "R.A.2 – Técnicas",
        weight: 0.30,
        criteria: &[
            ExamCriterion { id: "ra2c1", text: "Métodos de cocción" },
            ExamCriterion { id: "ra2c2", text: "Salsa" },
            ExamCriterion { id: "ra2c3", text: "Guarniciones" },
            ExamCriterion { id: "ra2c4", text: "Técnicas de corte y preparación" },
            ExamCriterion { id: "ra2c5", text: "Resultado final" },
        ],
    },
    ResultArea {
        id: "ra3",
        title: "R.A.3 – Elaboración a partir de materias primas",
        weight: 0.30,
        criteria: &[
            ExamCriterion { id: "ra3c1", text: "Aperitivo libre" },
            ExamCriterion { id: "ra3c2", text: "Diseño del plato principal" },
            ExamCriterion { id: "ra3c3", text: "Aprovechamiento de recursos" },
            ExamCriterion { id: "ra3c4", text: "Gestión del tiempo (2h)" },
        ],
    },
    ResultArea {
        id: "ra4",
        title: "R.A.4 – Necesidades alimenticias específicas",
        weight: 0.20,
        criteria: &[
            ExamCriterion { id: "ra4c1", text: "Identificación de exclusiones" },
            ExamCriterion { id: "ra4c2", text: "Sustituciones adecuadas" },
            ExamCriterion { id: "ra4c3", text: "Prevención contaminación cruzada" },
            ExamCriterion { id: "ra4c4", text: "Plato adaptado" },
        ],
    },
];

/// The recovery exam is marked against the second-trimester rubric.
pub fn exam_rubric(exam_type: ExamType) -> &'static [ResultArea] {
    match exam_type {
        ExamType::T1 => PRACTICAL_EXAM_RUBRIC_T1,
        ExamType::T2 | ExamType::Rec => PRACTICAL_EXAM_RUBRIC_T2,
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CourseModule {
    pub key: &'static str,
    pub name: &'static str,
    pub trimesters: usize,
}

pub const COURSE_MODULES: &[CourseModule] = &[
    CourseModule { key: "ofertas_gastronomicas", name: "Ofertas gastronómicas", trimesters: 2 },
    CourseModule { key: "productos_culinarios", name: "Productos culinarios", trimesters: 2 },
    CourseModule { key: "postres_restauracion", name: "Postres en restauración", trimesters: 2 },
    CourseModule {
        key: "empleabilidad_2",
        name: "Itinerario personal para la Empleabilidad II",
        trimesters: 2,
    },
    CourseModule { key: "proyecto_intermodular", name: "Proyecto Intermodular", trimesters: 3 },
    CourseModule {
        key: "sostenibilidad",
        name: "Sostenibilidad aplicada al sistema productivo",
        trimesters: 2,
    },
    CourseModule { key: "optativa", name: "Optativa", trimesters: 2 },
];

pub fn find_course_module(key: &str) -> Option<&'static CourseModule> {
    COURSE_MODULES.iter().find(|m| m.key == key)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Manual,
    Calculated,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Instrument {
    pub name: &'static str,
    pub kind: InstrumentKind,
    pub key: &'static str,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EvaluationPeriod {
    pub name: &'static str,
    pub instruments: &'static [Instrument],
}

pub const TRIMESTERS: &[EvaluationPeriod] = &[
    EvaluationPeriod {
        name: "1º Trimestre",
        instruments: &[
            Instrument { name: "Examen 1", kind: InstrumentKind::Manual, key: "examen1", weight: 0.10 },
            Instrument { name: "Examen 2", kind: InstrumentKind::Manual, key: "examen2", weight: 0.10 },
            Instrument { name: "Servicios 1", kind: InstrumentKind::Calculated, key: "servicios1", weight: 0.15 },
            Instrument { name: "Ex. Practico 1", kind: InstrumentKind::Calculated, key: "exPractico1", weight: 0.15 },
        ],
    },
    EvaluationPeriod {
        name: "2º Trimestre",
        instruments: &[
            Instrument { name: "Examen 3", kind: InstrumentKind::Manual, key: "examen3", weight: 0.10 },
            Instrument { name: "Examen 4", kind: InstrumentKind::Manual, key: "examen4", weight: 0.10 },
            Instrument { name: "Servicios 2", kind: InstrumentKind::Calculated, key: "servicios2", weight: 0.15 },
            Instrument { name: "Ex. Practico 2", kind: InstrumentKind::Calculated, key: "exPractico2", weight: 0.15 },
        ],
    },
];

pub const RECOVERY: EvaluationPeriod = EvaluationPeriod {
    name: "Recuperación",
    instruments: &[
        Instrument { name: "Ex. Teorico REC", kind: InstrumentKind::Manual, key: "recuperacion", weight: 0.50 },
        Instrument { name: "Ex. Practico REC", kind: InstrumentKind::Calculated, key: "exPracticoRec", weight: 0.50 },
    ],
};
