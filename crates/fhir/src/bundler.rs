//! Assembly of a FHIR bundle from one clinical record.
//!
//! The traversal order is fixed: the patient, then allergies, then each encounter in record
//! order. Within an encounter, locations come first, then procedures and diagnoses (each
//! preceded by its practitioner on first sight), then the encounter itself, then one observation
//! per order result. The encounter is appended after its procedures and diagnoses so that its
//! `diagnosis` list is complete when it enters the bundle.

use crate::bundle::{Bundle, BundleEntry, BundleType};
use crate::codes::{is_unspecified, CanonicalCode, CodeConverters};
use crate::datatypes::{
    date, date_time, non_empty, Address, AddressType, Annotation, CodeableConcept, Coding,
    ContactPoint, ContactPointSystem, ContactPointUse, HumanName, Identifier, Period, Quantity,
    QuantityComparator, Reference,
};
use crate::narrative::narrative;
use crate::registry::{ReferenceRegistry, RegistryScope};
use crate::resources::{
    AllergyIntolerance, AllergyIntoleranceType, AllergyReaction, Condition, Encounter,
    EncounterDiagnosis, EncounterLocation, EncounterStatusHistory, EventStatus, Location,
    Observation, Patient, Practitioner, Procedure, ProcedurePerformer, Resource, ResourceType,
};
use crate::{FhirError, FhirResult};
use simhosp_ir as ir;
use simhosp_uuid::IdGenerator;
use std::fmt;
use std::sync::Arc;

const ALLERGY_CLINICAL_STATUS_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/allergyintolerance-clinical";

/// Builds one [`Bundle`] per clinical record.
///
/// Holds the validated converters, the identifier allocator and, for
/// [`RegistryScope::Session`], the registry shared across calls. `generate` takes `&mut self`,
/// so concurrent use of one bundler needs external locking.
pub struct Bundler {
    bundle_type: BundleType,
    converters: CodeConverters,
    id_generator: Arc<dyn IdGenerator>,
    scope: RegistryScope,
    session: ReferenceRegistry,
}

impl fmt::Debug for Bundler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundler")
            .field("bundle_type", &self.bundle_type)
            .field("scope", &self.scope)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl Bundler {
    /// A bundler with a fresh registry per bundle.
    pub fn new(
        bundle_type: BundleType,
        converters: CodeConverters,
        id_generator: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            bundle_type,
            converters,
            id_generator,
            scope: RegistryScope::PerBundle,
            session: ReferenceRegistry::new(),
        }
    }

    pub fn with_registry_scope(mut self, scope: RegistryScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn bundle_type(&self) -> BundleType {
        self.bundle_type
    }

    pub fn registry_scope(&self) -> RegistryScope {
        self.scope
    }

    /// The registry kept across calls. Always empty under [`RegistryScope::PerBundle`].
    pub fn session_registry(&self) -> &ReferenceRegistry {
        &self.session
    }

    /// Forget every location and practitioner seen so far in this session.
    pub fn reset_session(&mut self) {
        self.session.clear();
    }

    /// Translate `record` into a bundle, deduplicating according to the bundler's scope.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidInput`] if the record or its person is absent. Nothing is
    /// registered in that case.
    pub fn generate<'r>(
        &mut self,
        record: impl Into<Option<&'r ir::ClinicalRecord>>,
    ) -> FhirResult<Bundle> {
        match self.scope {
            RegistryScope::PerBundle => {
                let mut registry = ReferenceRegistry::new();
                self.generate_with_registry(record, &mut registry)
            }
            RegistryScope::Session => {
                let mut registry = std::mem::take(&mut self.session);
                let result = self.generate_with_registry(record, &mut registry);
                self.session = registry;
                result
            }
        }
    }

    /// Translate `record` into a bundle using a registry owned by the caller.
    ///
    /// Locations and practitioners already in `registry` are referenced without being added to
    /// this bundle.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidInput`] if the record or its person is absent.
    pub fn generate_with_registry<'r>(
        &self,
        record: impl Into<Option<&'r ir::ClinicalRecord>>,
        registry: &mut ReferenceRegistry,
    ) -> FhirResult<Bundle> {
        let record = record.into().ok_or_else(|| {
            FhirError::InvalidInput("cannot generate resources from an absent record".into())
        })?;
        let person = record.person.as_ref().ok_or_else(|| {
            FhirError::InvalidInput("cannot generate resources from a record without a person".into())
        })?;

        let mut assembly = Assembly {
            bundler: self,
            registry,
            bundle: Bundle::new(self.bundle_type),
        };

        let patient_ref = assembly.patient(person);
        for allergy in &record.allergies {
            assembly.allergy(allergy, &patient_ref);
        }
        for encounter in &record.encounters {
            assembly.encounter(record, encounter, &patient_ref);
        }

        let bundle = assembly.bundle;
        tracing::info!(
            "assembled {} bundle with {} entries ({} encounters, {} allergies)",
            bundle.bundle_type,
            bundle.len(),
            record.encounters.len(),
            record.allergies.len()
        );
        Ok(bundle)
    }
}

// ============================================================================
// Traversal
// ============================================================================

/// State for one `generate` call.
struct Assembly<'a> {
    bundler: &'a Bundler,
    registry: &'a mut ReferenceRegistry,
    bundle: Bundle,
}

impl Assembly<'_> {
    fn new_id(&self) -> String {
        self.bundler.id_generator.new_id()
    }

    fn converters(&self) -> &CodeConverters {
        &self.bundler.converters
    }

    fn push(&mut self, resource: Resource) {
        self.bundle
            .push(BundleEntry::new(resource, self.bundler.bundle_type));
    }

    fn patient(&mut self, person: &ir::Person) -> Reference {
        let id = self.new_id();
        let (deceased_boolean, deceased_date_time) = match person.date_of_death {
            Some(_) => (None, date_time(person.date_of_death)),
            None => (Some(!person.death_indicator.is_empty()), None),
        };

        let patient = Patient {
            id: id.clone(),
            text: Some(narrative([person.text()])),
            identifier: identifier(&person.mrn),
            name: vec![human_name(
                &person.prefix,
                [person.first_name.as_str(), person.middle_name.as_str()],
                &person.surname,
                &person.suffix,
            )],
            telecom: telecom(&person.phone_number),
            gender: self.converters().gender.translate(&person.gender),
            birth_date: date(person.birth),
            deceased_boolean,
            deceased_date_time,
            address: person
                .address
                .iter()
                .map(|a| self.address(a))
                .collect(),
        };
        self.push(Resource::Patient(patient));

        Reference::new(ResourceType::Patient, &id).with_display(person.full_name())
    }

    fn address(&self, address: &ir::Address) -> Address {
        Address {
            // The record's address "type" is FHIR's address "use".
            address_use: self.converters().address_use.translate(&address.address_type),
            address_type: AddressType::Both,
            line: [&address.first_line, &address.second_line]
                .into_iter()
                .filter(|l| !l.is_empty())
                .cloned()
                .collect(),
            city: non_empty(address.city.clone()),
            postal_code: non_empty(address.postal_code.clone()),
            country: non_empty(address.country.clone()),
        }
    }

    fn allergy(&mut self, allergy: &ir::Allergy, patient_ref: &Reference) {
        let converters = self.converters();
        let category = converters.allergy_category.translate(&allergy.allergy_type);
        let severity = converters.allergy_severity.translate(&allergy.severity);

        let reaction = if allergy.reaction.is_empty() && is_unspecified(&severity) {
            Vec::new()
        } else {
            vec![AllergyReaction {
                manifestation: vec![CodeableConcept::from_text(&allergy.reaction)],
                severity,
            }]
        };

        let resource = AllergyIntolerance {
            id: self.new_id(),
            // Allergy status lifecycle is not modelled.
            clinical_status: CodeableConcept {
                coding: vec![Coding {
                    system: Some(ALLERGY_CLINICAL_STATUS_SYSTEM.to_string()),
                    code: Some("active".to_string()),
                    display: Some("Active".to_string()),
                }],
                text: None,
            },
            allergy_type: AllergyIntoleranceType::Allergy,
            category: Some(category)
                .filter(|c| !is_unspecified(c))
                .into_iter()
                .collect(),
            code: self.coded_concept(&allergy.description),
            patient: patient_ref.clone(),
            recorded_date: date_time(allergy.identification_date_time),
            reaction,
        };
        self.push(Resource::AllergyIntolerance(resource));
    }

    fn encounter(
        &mut self,
        record: &ir::ClinicalRecord,
        source: &ir::Encounter,
        patient_ref: &Reference,
    ) {
        let id = self.new_id();
        let encounter_ref = Reference::new(ResourceType::Encounter, &id);
        let statuses = &self.converters().encounter_status;

        let mut encounter = Encounter {
            id,
            text: Some(narrative([source.text()])),
            identifier: identifier(&record.visit_id),
            status: statuses.translate(source.status.as_str()),
            status_history: source
                .status_history
                .iter()
                .map(|h| EncounterStatusHistory {
                    status: statuses.translate(h.status.as_str()),
                    period: Period::from_times(h.start, h.end),
                })
                .collect(),
            class: non_empty(record.class.clone()).map(|code| Coding {
                code: Some(code),
                ..Default::default()
            }),
            subject: Some(patient_ref.clone()),
            period: Period::from_times(source.start, source.end),
            diagnosis: Vec::new(),
            location: Vec::new(),
        };

        for history in &source.location_history {
            let Some(location) = &history.location else {
                continue;
            };
            let location_ref = self.location(location);
            encounter.location.push(EncounterLocation {
                location: location_ref,
                period: Period::from_times(history.start, history.end),
            });
        }

        for procedure in &source.procedures {
            let performer = procedure.clinician.as_ref().map(|d| self.practitioner(d));
            let procedure_ref = self.procedure(procedure, patient_ref, &encounter_ref, performer);
            encounter.diagnosis.push(EncounterDiagnosis {
                condition: procedure_ref,
            });
        }

        for diagnosis in &source.diagnoses {
            let recorder = diagnosis.clinician.as_ref().map(|d| self.practitioner(d));
            let condition_ref = self.condition(diagnosis, patient_ref, &encounter_ref, recorder);
            encounter.diagnosis.push(EncounterDiagnosis {
                condition: condition_ref,
            });
        }

        self.push(Resource::Encounter(encounter));

        for order in &source.orders {
            for result in &order.results {
                self.observation(order, result, patient_ref, &encounter_ref);
            }
        }
    }

    fn location(&mut self, location: &ir::Location) -> Reference {
        let bundler = self.bundler;
        let (entry, reference) = self.registry.get_or_create(location, || {
            let id = bundler.id_generator.new_id();
            let name = location.name();
            let resource = Resource::Location(Location {
                id: id.clone(),
                text: Some(narrative([name.as_str()])),
                name: non_empty(name.clone()),
            });
            (
                BundleEntry::new(resource, bundler.bundle_type),
                Reference::new(ResourceType::Location, &id).with_display(name),
            )
        });
        if let Some(entry) = entry {
            self.bundle.push(entry);
        }
        reference
    }

    fn practitioner(&mut self, doctor: &ir::Doctor) -> Reference {
        let bundler = self.bundler;
        let (entry, reference) = self.registry.get_or_create(doctor, || {
            let id = bundler.id_generator.new_id();
            let full_name = doctor.full_name();
            let resource = Resource::Practitioner(Practitioner {
                id: id.clone(),
                text: Some(narrative([full_name.as_str()])),
                identifier: identifier(&doctor.id),
                name: vec![human_name(
                    &doctor.prefix,
                    [doctor.first_name.as_str()],
                    &doctor.surname,
                    "",
                )],
            });
            (
                BundleEntry::new(resource, bundler.bundle_type),
                Reference::new(ResourceType::Practitioner, &id).with_display(full_name),
            )
        });
        if let Some(entry) = entry {
            self.bundle.push(entry);
        }
        reference
    }

    fn procedure(
        &mut self,
        procedure: &ir::DiagnosisOrProcedure,
        patient_ref: &Reference,
        encounter_ref: &Reference,
        performer: Option<Reference>,
    ) -> Reference {
        let id = self.new_id();
        let text = procedure.text();

        let resource = Procedure {
            id: id.clone(),
            text: Some(narrative([text.as_str()])),
            status: EventStatus::Completed,
            category: non_empty(procedure.procedure_type.clone())
                .map(|t| CodeableConcept::from_text(&t)),
            code: procedure
                .description
                .as_ref()
                .and_then(|d| self.coded_concept(d)),
            subject: patient_ref.clone(),
            encounter: Some(encounter_ref.clone()),
            performed_date_time: date_time(procedure.date_time),
            performer: performer
                .into_iter()
                .map(|actor| ProcedurePerformer { actor })
                .collect(),
        };
        self.push(Resource::Procedure(resource));

        Reference::new(ResourceType::Procedure, &id).with_display(text)
    }

    fn condition(
        &mut self,
        diagnosis: &ir::DiagnosisOrProcedure,
        patient_ref: &Reference,
        encounter_ref: &Reference,
        recorder: Option<Reference>,
    ) -> Reference {
        let id = self.new_id();
        let text = diagnosis.text();

        let resource = Condition {
            id: id.clone(),
            text: Some(narrative([text.as_str()])),
            code: diagnosis
                .description
                .as_ref()
                .and_then(|d| self.coded_concept(d)),
            subject: patient_ref.clone(),
            encounter: Some(encounter_ref.clone()),
            recorded_date: date_time(diagnosis.date_time),
            recorder,
        };
        self.push(Resource::Condition(resource));

        Reference::new(ResourceType::Condition, &id).with_display(text)
    }

    fn observation(
        &mut self,
        order: &ir::Order,
        result: &ir::LabResult,
        patient_ref: &Reference,
        encounter_ref: &Reference,
    ) {
        let (value_quantity, value_string) = observation_value(&result.value, &result.unit);
        let note = observation_notes(result, value_string.as_deref());

        let resource = Observation {
            id: self.new_id(),
            text: Some(narrative([result.text(), result.notes.join("; ")])),
            status: self.converters().observation_status.translate(&result.status),
            code: result
                .test_name
                .as_ref()
                .and_then(|t| self.coded_concept(t)),
            subject: patient_ref.clone(),
            encounter: Some(encounter_ref.clone()),
            effective_date_time: date_time(result.observation_date_time.or(order.order_date_time)),
            value_quantity,
            value_string,
            note,
        };
        self.push(Resource::Observation(resource));
    }

    /// `None` for an element with no code, display or system.
    fn coded_concept(&self, coded: &ir::CodedElement) -> Option<CodeableConcept> {
        if coded.id.is_empty() && coded.text.is_empty() && coded.coding_system.is_empty() {
            return None;
        }
        let system = self.converters().coding_system.translate(&coded.coding_system);
        Some(CodeableConcept {
            coding: vec![Coding {
                system: Some(system)
                    .filter(|s| !is_unspecified(s))
                    .map(|s| s.code().to_string()),
                code: non_empty(coded.id.clone()),
                display: non_empty(coded.text.clone()),
            }],
            text: None,
        })
    }
}

// ============================================================================
// Datatype helpers
// ============================================================================

fn identifier(value: &str) -> Vec<Identifier> {
    non_empty(value.to_string())
        .map(|value| Identifier { value })
        .into_iter()
        .collect()
}

fn human_name<'a>(
    prefix: &str,
    given: impl IntoIterator<Item = &'a str>,
    family: &str,
    suffix: &str,
) -> HumanName {
    HumanName {
        family: non_empty(family.to_string()),
        given: given
            .into_iter()
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect(),
        prefix: non_empty(prefix.to_string()).into_iter().collect(),
        suffix: non_empty(suffix.to_string()).into_iter().collect(),
    }
}

fn telecom(phone: &str) -> Vec<ContactPoint> {
    non_empty(phone.to_string())
        .map(|value| ContactPoint {
            system: ContactPointSystem::Phone,
            value,
            contact_use: ContactPointUse::Home,
        })
        .into_iter()
        .collect()
}

/// Numeric values, optionally behind a comparator such as `>90`, become a quantity carrying the
/// decimal text unchanged. Anything else is kept as a string.
fn observation_value(value: &str, unit: &str) -> (Option<Quantity>, Option<String>) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return (None, None);
    }
    let (comparator, number) = QuantityComparator::split(trimmed);
    match number.parse::<serde_json::Number>() {
        Ok(number) => (
            Some(Quantity {
                value: number,
                comparator,
                unit: non_empty(unit.to_string()),
            }),
            None,
        ),
        Err(_) => (None, Some(value.to_string())),
    }
}

/// Notes as annotations. A unit that no quantity carries is kept as a trailing annotation.
fn observation_notes(result: &ir::LabResult, value_string: Option<&str>) -> Vec<Annotation> {
    let mut notes: Vec<Annotation> = result
        .notes
        .iter()
        .map(|n| Annotation { text: n.clone() })
        .collect();
    if value_string.is_some() && !result.unit.trim().is_empty() {
        notes.push(Annotation {
            text: format!("Unit: {}", result.unit),
        });
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::{AdministrativeGender, AllergySeverity};
    use crate::mapping::MappingConfig;
    use chrono::{DateTime, TimeZone, Utc};
    use simhosp_uuid::SequentialIdGenerator;
    use std::collections::HashSet;

    fn at(hour: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2020, 2, 12, hour, 0, 0).unwrap())
    }

    fn bundler(bundle_type: BundleType) -> Bundler {
        Bundler::new(
            bundle_type,
            CodeConverters::defaults(),
            Arc::new(SequentialIdGenerator::new()),
        )
    }

    fn ward(bed: &str) -> ir::Location {
        ir::Location {
            facility: "St Elsewhere".into(),
            point_of_care: "Ward 3".into(),
            bed: format!("Bed {bed}"),
            ..Default::default()
        }
    }

    fn doctor(id: &str) -> ir::Doctor {
        ir::Doctor {
            id: id.into(),
            first_name: "Jane".into(),
            surname: "Doe".into(),
            prefix: "Dr".into(),
        }
    }

    fn procedure(clinician: Option<ir::Doctor>, text: &str) -> ir::DiagnosisOrProcedure {
        ir::DiagnosisOrProcedure {
            clinician,
            date_time: at(10),
            description: Some(ir::CodedElement::new("80146002", text, "SNOMED")),
            procedure_type: "Surgical".into(),
        }
    }

    fn person() -> ir::Person {
        ir::Person {
            mrn: "12345".into(),
            first_name: "Dave".into(),
            surname: "Smith".into(),
            gender: "M".into(),
            address: Some(ir::Address {
                first_line: "6 Pancras Square".into(),
                city: "London".into(),
                postal_code: "N1C 4AG".into(),
                address_type: "HOME".into(),
                ..Default::default()
            }),
            phone_number: "020 1234 5678".into(),
            ..Default::default()
        }
    }

    fn record() -> ir::ClinicalRecord {
        ir::ClinicalRecord {
            person: Some(person()),
            visit_id: "V001".into(),
            class: "INPATIENT".into(),
            allergies: vec![ir::Allergy {
                allergy_type: "FA".into(),
                description: ir::CodedElement::new("91935009", "Peanuts", "SNOMED"),
                severity: "SV".into(),
                reaction: "Anaphylaxis".into(),
                identification_date_time: at(8),
            }],
            encounters: vec![ir::Encounter {
                status: ir::EncounterStatus::InProgress,
                start: at(9),
                end: None,
                status_history: vec![ir::StatusHistory {
                    status: ir::EncounterStatus::Arrived,
                    start: at(9),
                    end: at(10),
                }],
                location_history: vec![
                    ir::LocationHistory {
                        location: Some(ward("1")),
                        start: at(9),
                        end: at(11),
                    },
                    ir::LocationHistory {
                        location: Some(ward("1")),
                        start: at(12),
                        end: None,
                    },
                ],
                procedures: vec![
                    procedure(Some(doctor("C1")), "Appendectomy"),
                    procedure(Some(doctor("C1")), "Wound check"),
                ],
                diagnoses: vec![procedure(Some(doctor("C2")), "Appendicitis")],
                orders: vec![ir::Order {
                    order_profile: None,
                    placer: "P1".into(),
                    order_date_time: at(9),
                    results: vec![
                        ir::LabResult {
                            test_name: Some(ir::CodedElement::new("2823-3", "Potassium", "LN")),
                            value: "4.10".into(),
                            unit: "mmol/L".into(),
                            status: "F".into(),
                            notes: vec!["Haemolysed".into(), "Repeat advised".into()],
                            observation_date_time: at(10),
                        },
                        ir::LabResult {
                            test_name: None,
                            value: "positive".into(),
                            unit: "U/mL".into(),
                            status: "P".into(),
                            ..Default::default()
                        },
                    ],
                }],
            }],
        }
    }

    fn resource_types(bundle: &Bundle) -> Vec<ResourceType> {
        bundle
            .entry
            .iter()
            .map(|e| e.resource.resource_type())
            .collect()
    }

    #[test]
    fn produces_exactly_one_patient() {
        let bundle = bundler(BundleType::Batch)
            .generate(&record())
            .expect("generate");
        assert_eq!(bundle.entries_of(ResourceType::Patient).count(), 1);

        let minimal = ir::ClinicalRecord {
            person: Some(ir::Person::default()),
            ..Default::default()
        };
        let bundle = bundler(BundleType::Batch)
            .generate(&minimal)
            .expect("generate");
        assert_eq!(resource_types(&bundle), vec![ResourceType::Patient]);
    }

    #[test]
    fn follows_traversal_order() {
        let bundle = bundler(BundleType::Batch)
            .generate(&record())
            .expect("generate");

        assert_eq!(
            resource_types(&bundle),
            vec![
                ResourceType::Patient,
                ResourceType::AllergyIntolerance,
                ResourceType::Location,
                ResourceType::Practitioner,
                ResourceType::Procedure,
                ResourceType::Procedure,
                ResourceType::Practitioner,
                ResourceType::Condition,
                ResourceType::Encounter,
                ResourceType::Observation,
                ResourceType::Observation,
            ]
        );
    }

    #[test]
    fn full_urls_are_unique() {
        let bundle = bundler(BundleType::Batch)
            .generate(&record())
            .expect("generate");

        let urls: HashSet<&str> = bundle.entry.iter().map(|e| e.full_url.as_str()).collect();
        assert_eq!(urls.len(), bundle.len());
        for entry in &bundle.entry {
            assert_eq!(
                entry.full_url,
                format!("{}/{}", entry.resource.resource_type(), entry.resource.id())
            );
        }
    }

    #[test]
    fn every_reference_resolves_within_the_bundle() {
        let bundle = bundler(BundleType::Collection)
            .generate(&record())
            .expect("generate");

        let mut checked = 0;
        for entry in &bundle.entry {
            for reference in entry.resource.references() {
                assert!(
                    bundle.find(&reference.reference).is_some(),
                    "dangling reference {} in {}",
                    reference.reference,
                    entry.full_url
                );
                checked += 1;
            }
        }
        assert!(checked > 10);
    }

    #[test]
    fn identical_locations_share_one_resource() {
        let bundle = bundler(BundleType::Batch)
            .generate(&record())
            .expect("generate");

        let locations: Vec<_> = bundle.entries_of(ResourceType::Location).collect();
        assert_eq!(locations.len(), 1);

        let Some(Resource::Encounter(encounter)) = bundle
            .entries_of(ResourceType::Encounter)
            .next()
            .map(|e| &e.resource)
        else {
            panic!("expected an encounter");
        };
        assert_eq!(encounter.location.len(), 2);
        for entry in &encounter.location {
            assert_eq!(entry.location.reference, locations[0].full_url);
            assert_eq!(entry.location.display.as_deref(), Some("Ward 3, Bed 1, St Elsewhere"));
        }
        assert_eq!(
            encounter.location[1].period,
            Some(Period {
                start: date_time(at(12)),
                end: None
            })
        );
    }

    #[test]
    fn shared_location_and_doctor_across_encounters_appear_once() {
        let mut record = record();
        let mut second = record.encounters[0].clone();
        second.procedures = vec![procedure(Some(doctor("C1")), "Suture removal")];
        second.diagnoses = Vec::new();
        record.encounters.push(second);

        let bundle = bundler(BundleType::Batch)
            .generate(&record)
            .expect("generate");

        assert_eq!(bundle.entries_of(ResourceType::Encounter).count(), 2);
        let locations: Vec<_> = bundle.entries_of(ResourceType::Location).collect();
        assert_eq!(locations.len(), 1);
        assert_eq!(bundle.entries_of(ResourceType::Practitioner).count(), 2);

        for entry in bundle.entries_of(ResourceType::Encounter) {
            let Resource::Encounter(encounter) = &entry.resource else {
                panic!("expected an encounter");
            };
            assert!(encounter
                .location
                .iter()
                .all(|l| l.location.reference == locations[0].full_url));
        }

        let performers: HashSet<&str> = bundle
            .entries_of(ResourceType::Procedure)
            .filter_map(|e| match &e.resource {
                Resource::Procedure(p) => p.performer.first(),
                _ => None,
            })
            .map(|p| p.actor.reference.as_str())
            .collect();
        assert_eq!(performers.len(), 1);
    }

    #[test]
    fn absent_location_is_skipped() {
        let mut record = record();
        record.encounters[0].location_history = vec![
            ir::LocationHistory {
                location: None,
                start: at(9),
                end: None,
            },
            ir::LocationHistory {
                location: Some(ward("2")),
                start: at(10),
                end: None,
            },
        ];

        let bundle = bundler(BundleType::Batch)
            .generate(&record)
            .expect("generate");
        assert_eq!(bundle.entries_of(ResourceType::Location).count(), 1);
        let Some(Resource::Encounter(encounter)) = bundle
            .entries_of(ResourceType::Encounter)
            .next()
            .map(|e| &e.resource)
        else {
            panic!("expected an encounter");
        };
        assert_eq!(encounter.location.len(), 1);
    }

    #[test]
    fn same_clinician_shares_one_practitioner() {
        let bundle = bundler(BundleType::Batch)
            .generate(&record())
            .expect("generate");

        let practitioners: Vec<_> = bundle.entries_of(ResourceType::Practitioner).collect();
        assert_eq!(practitioners.len(), 2);

        let performers: Vec<&str> = bundle
            .entries_of(ResourceType::Procedure)
            .filter_map(|e| match &e.resource {
                Resource::Procedure(p) => Some(p.performer[0].actor.reference.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(performers.len(), 2);
        assert_eq!(performers[0], performers[1]);
        assert_eq!(performers[0], practitioners[0].full_url);
    }

    #[test]
    fn different_clinicians_get_their_own_practitioners() {
        let mut record = record();
        record.encounters[0].procedures = vec![
            procedure(Some(doctor("C1")), "Appendectomy"),
            procedure(Some(doctor("C9")), "Wound check"),
        ];
        record.encounters[0].diagnoses.clear();

        let bundle = bundler(BundleType::Batch)
            .generate(&record)
            .expect("generate");
        assert_eq!(bundle.entries_of(ResourceType::Practitioner).count(), 2);
    }

    #[test]
    fn absent_clinician_leaves_no_performer_or_recorder() {
        let mut record = record();
        record.encounters[0].procedures = vec![procedure(None, "Appendectomy")];
        record.encounters[0].diagnoses = vec![procedure(None, "Appendicitis")];

        let bundle = bundler(BundleType::Batch)
            .generate(&record)
            .expect("generate");
        assert_eq!(bundle.entries_of(ResourceType::Practitioner).count(), 0);

        for entry in &bundle.entry {
            match &entry.resource {
                Resource::Procedure(p) => assert!(p.performer.is_empty()),
                Resource::Condition(c) => assert!(c.recorder.is_none()),
                _ => {}
            }
        }
    }

    #[test]
    fn encounter_links_procedures_and_conditions() {
        let bundle = bundler(BundleType::Batch)
            .generate(&record())
            .expect("generate");

        let Some(Resource::Encounter(encounter)) = bundle
            .entries_of(ResourceType::Encounter)
            .next()
            .map(|e| &e.resource)
        else {
            panic!("expected an encounter");
        };
        let linked: Vec<&str> = encounter
            .diagnosis
            .iter()
            .filter_map(|d| d.condition.target().map(|(t, _)| t))
            .collect();
        assert_eq!(linked, vec!["Procedure", "Procedure", "Condition"]);
        assert_eq!(
            encounter.diagnosis[0].condition.display.as_deref(),
            Some("Appendectomy")
        );
    }

    #[test]
    fn batch_entries_carry_create_requests() {
        let bundle = bundler(BundleType::Batch)
            .generate(&record())
            .expect("generate");

        assert_eq!(bundle.bundle_type, BundleType::Batch);
        for entry in &bundle.entry {
            let request = entry.request.as_ref().expect("batch entry has a request");
            assert_eq!(request.url, entry.resource.resource_type().as_str());
            assert_eq!(
                serde_json::to_value(request.method).expect("serialize"),
                serde_json::json!("POST")
            );
        }
    }

    #[test]
    fn collection_entries_carry_no_request() {
        let bundle = bundler(BundleType::Collection)
            .generate(&record())
            .expect("generate");

        assert!(!bundle.is_empty());
        assert!(bundle.entry.iter().all(|e| e.request.is_none()));
    }

    #[test]
    fn absent_record_or_person_is_invalid_input() {
        let mut bundler = bundler(BundleType::Batch).with_registry_scope(RegistryScope::Session);

        let err = bundler
            .generate(None::<&ir::ClinicalRecord>)
            .expect_err("absent record");
        assert!(matches!(err, FhirError::InvalidInput(_)));

        let err = bundler
            .generate(&ir::ClinicalRecord::default())
            .expect_err("absent person");
        assert!(matches!(err, FhirError::InvalidInput(_)));
        assert!(bundler.session_registry().is_empty());
    }

    #[test]
    fn patient_fields_are_translated() {
        let mut record = record();
        if let Some(person) = record.person.as_mut() {
            person.death_indicator = "Y".into();
        }
        let bundle = bundler(BundleType::Batch)
            .generate(&record)
            .expect("generate");

        let Resource::Patient(patient) = &bundle.entry[0].resource else {
            panic!("patient comes first");
        };
        assert_eq!(patient.gender, AdministrativeGender::Male);
        assert_eq!(patient.identifier[0].value, "12345");
        assert_eq!(patient.deceased_boolean, Some(true));
        assert_eq!(patient.deceased_date_time, None);

        let value = serde_json::to_value(&bundle.entry[0].resource).expect("serialize");
        assert_eq!(value["resourceType"], "Patient");
        assert_eq!(value["gender"], "male");
        assert_eq!(value["name"][0]["family"], "Smith");
        assert_eq!(value["name"][0]["given"], serde_json::json!(["Dave"]));
        assert_eq!(value["address"][0]["use"], "home");
        assert_eq!(value["address"][0]["type"], "both");
        assert_eq!(value["telecom"][0]["system"], "phone");
        assert_eq!(value["text"]["status"], "generated");
    }

    #[test]
    fn date_of_death_wins_over_indicator() {
        let mut record = record();
        if let Some(person) = record.person.as_mut() {
            person.date_of_death = at(23);
            person.death_indicator = "Y".into();
        }
        let bundle = bundler(BundleType::Batch)
            .generate(&record)
            .expect("generate");

        let value = serde_json::to_value(&bundle.entry[0].resource).expect("serialize");
        assert_eq!(value["deceasedDateTime"], "2020-02-12T23:00:00Z");
        assert!(value.get("deceasedBoolean").is_none());
    }

    #[test]
    fn allergy_carries_fixed_status_and_translated_codes() {
        let bundle = bundler(BundleType::Batch)
            .generate(&record())
            .expect("generate");

        let Resource::AllergyIntolerance(allergy) = &bundle.entry[1].resource else {
            panic!("allergy follows the patient");
        };
        assert_eq!(allergy.reaction[0].severity, AllergySeverity::Severe);
        assert_eq!(allergy.patient.reference, bundle.entry[0].full_url);

        let value = serde_json::to_value(&bundle.entry[1].resource).expect("serialize");
        assert_eq!(value["clinicalStatus"]["coding"][0]["code"], "active");
        assert_eq!(value["type"], "allergy");
        assert_eq!(value["category"], serde_json::json!(["food"]));
        assert_eq!(value["code"]["coding"][0]["system"], "http://snomed.info/sct");
        assert_eq!(value["reaction"][0]["manifestation"][0]["text"], "Anaphylaxis");
        assert_eq!(value["recordedDate"], "2020-02-12T08:00:00Z");
    }

    #[test]
    fn unmapped_codes_are_omitted() {
        let mut record = record();
        record.allergies[0].allergy_type = "ZZ".into();
        record.allergies[0].severity = "ZZ".into();
        if let Some(person) = record.person.as_mut() {
            person.gender = "ZZ".into();
        }

        let bundle = bundler(BundleType::Batch)
            .generate(&record)
            .expect("generate");
        let patient = serde_json::to_value(&bundle.entry[0].resource).expect("serialize");
        let allergy = serde_json::to_value(&bundle.entry[1].resource).expect("serialize");

        assert!(patient.get("gender").is_none());
        assert!(allergy.get("category").is_none());
        assert!(allergy["reaction"][0].get("severity").is_none());
    }

    #[test]
    fn observations_copy_values_and_notes() {
        let bundle = bundler(BundleType::Batch)
            .generate(&record())
            .expect("generate");

        let observations: Vec<serde_json::Value> = bundle
            .entries_of(ResourceType::Observation)
            .map(|e| serde_json::to_value(&e.resource).expect("serialize"))
            .collect();
        assert_eq!(observations.len(), 2);

        let potassium = &observations[0];
        assert_eq!(potassium["status"], "final");
        assert_eq!(potassium["valueQuantity"]["value"].to_string(), "4.10");
        assert_eq!(potassium["valueQuantity"]["unit"], "mmol/L");
        assert_eq!(potassium["effectiveDateTime"], "2020-02-12T10:00:00Z");
        assert_eq!(potassium["code"]["coding"][0]["system"], "http://loinc.org");
        assert_eq!(potassium["note"][1]["text"], "Repeat advised");
        assert_eq!(
            potassium["text"]["div"],
            "<div xmlns=\"http://www.w3.org/1999/xhtml\"><p>Potassium</p>\
             <p>Haemolysed; Repeat advised</p></div>"
        );

        let qualitative = &observations[1];
        assert_eq!(qualitative["status"], "preliminary");
        assert_eq!(qualitative["valueString"], "positive");
        assert!(qualitative.get("valueQuantity").is_none());
        assert_eq!(qualitative["note"][0]["text"], "Unit: U/mL");
        assert_eq!(qualitative["effectiveDateTime"], "2020-02-12T09:00:00Z");
        assert!(qualitative.get("code").is_none());
    }

    #[test]
    fn encounter_translates_status_and_history() {
        let bundle = bundler(BundleType::Batch)
            .generate(&record())
            .expect("generate");

        let encounter = bundle
            .entries_of(ResourceType::Encounter)
            .map(|e| serde_json::to_value(&e.resource).expect("serialize"))
            .next()
            .expect("encounter");
        assert_eq!(encounter["status"], "in-progress");
        assert_eq!(encounter["statusHistory"][0]["status"], "arrived");
        assert_eq!(encounter["class"]["code"], "INPATIENT");
        assert_eq!(encounter["identifier"][0]["value"], "V001");
        assert_eq!(encounter["period"]["start"], "2020-02-12T09:00:00Z");
        assert!(encounter["period"].get("end").is_none());
        assert_eq!(encounter["subject"]["display"], "Dave Smith");
    }

    #[test]
    fn empty_class_leaves_encounter_class_out() {
        let mut record = record();
        record.class = String::new();

        let bundle = bundler(BundleType::Batch)
            .generate(&record)
            .expect("generate");

        let encounter = bundle
            .entries_of(ResourceType::Encounter)
            .map(|e| serde_json::to_value(&e.resource).expect("serialize"))
            .next()
            .expect("encounter");
        assert!(encounter.get("class").is_none());
    }

    #[test]
    fn mapping_overrides_apply_to_output() {
        let mapping = MappingConfig::parse("genders:\n  female: [M]\n").expect("mapping");
        let converters = CodeConverters::from_mapping(&mapping).expect("converters");
        let mut bundler = Bundler::new(
            BundleType::Batch,
            converters,
            Arc::new(SequentialIdGenerator::new()),
        );

        let bundle = bundler.generate(&record()).expect("generate");
        let Resource::Patient(patient) = &bundle.entry[0].resource else {
            panic!("patient comes first");
        };
        assert_eq!(patient.gender, AdministrativeGender::Female);
    }

    #[test]
    fn per_bundle_scope_repeats_shared_entities() {
        let mut bundler = bundler(BundleType::Batch);

        let first = bundler.generate(&record()).expect("generate");
        let second = bundler.generate(&record()).expect("generate");

        assert_eq!(first.entries_of(ResourceType::Location).count(), 1);
        assert_eq!(second.entries_of(ResourceType::Location).count(), 1);
        assert!(bundler.session_registry().is_empty());

        let first_ids: HashSet<&str> = first.entry.iter().map(|e| e.full_url.as_str()).collect();
        assert!(second
            .entry
            .iter()
            .all(|e| !first_ids.contains(e.full_url.as_str())));
    }

    #[test]
    fn session_scope_deduplicates_across_bundles() {
        let mut bundler = bundler(BundleType::Batch).with_registry_scope(RegistryScope::Session);

        let first = bundler.generate(&record()).expect("generate");
        let second = bundler.generate(&record()).expect("generate");

        assert_eq!(first.entries_of(ResourceType::Location).count(), 1);
        assert_eq!(first.entries_of(ResourceType::Practitioner).count(), 2);
        assert_eq!(second.entries_of(ResourceType::Location).count(), 0);
        assert_eq!(second.entries_of(ResourceType::Practitioner).count(), 0);
        assert_eq!(bundler.session_registry().location_count(), 1);

        let Some(Resource::Encounter(encounter)) = second
            .entries_of(ResourceType::Encounter)
            .next()
            .map(|e| &e.resource)
        else {
            panic!("expected an encounter");
        };
        let location_url = &first
            .entries_of(ResourceType::Location)
            .next()
            .expect("location")
            .full_url;
        assert_eq!(&encounter.location[0].location.reference, location_url);

        bundler.reset_session();
        let third = bundler.generate(&record()).expect("generate");
        assert_eq!(third.entries_of(ResourceType::Location).count(), 1);
    }

    #[test]
    fn caller_owned_registry_is_honoured() {
        let bundler = bundler(BundleType::Collection);
        let mut registry = ReferenceRegistry::new();

        let first = bundler
            .generate_with_registry(&record(), &mut registry)
            .expect("generate");
        let second = bundler
            .generate_with_registry(&record(), &mut registry)
            .expect("generate");

        assert_eq!(first.entries_of(ResourceType::Location).count(), 1);
        assert_eq!(second.entries_of(ResourceType::Location).count(), 0);
        assert_eq!(registry.practitioner_count(), 2);
    }

    #[test]
    fn numeric_values_become_quantities() {
        let (quantity, string) = observation_value("12", "g/L");
        assert_eq!(string, None);
        let quantity = quantity.expect("quantity");
        assert_eq!(quantity.value.to_string(), "12");
        assert_eq!(quantity.comparator, None);
        assert_eq!(quantity.unit.as_deref(), Some("g/L"));

        assert_eq!(observation_value("", "g/L"), (None, None));
        assert_eq!(
            observation_value("trace", "mg/dL"),
            (None, Some("trace".to_string()))
        );
    }

    #[test]
    fn quantity_keeps_decimal_text() {
        for text in ["4.10", "1e2", "123456789012345678901", "-0.050"] {
            let (quantity, _) = observation_value(text, "mmol/L");
            let quantity = quantity.expect("quantity");
            assert_eq!(quantity.value.to_string(), text);
            assert_eq!(
                serde_json::to_string(&quantity).expect("serialize"),
                format!("{{\"value\":{text},\"unit\":\"mmol/L\"}}")
            );
        }
    }

    #[test]
    fn comparator_prefix_splits_off_the_value() {
        let (quantity, string) = observation_value(">90", "mL/min");
        assert_eq!(string, None);
        let quantity = quantity.expect("quantity");
        assert_eq!(quantity.comparator, Some(QuantityComparator::GreaterThan));
        assert_eq!(quantity.value.to_string(), "90");
        assert_eq!(
            serde_json::to_value(&quantity).expect("serialize")["comparator"],
            ">"
        );

        let (quantity, _) = observation_value("<= 0.5", "mg/L");
        let quantity = quantity.expect("quantity");
        assert_eq!(quantity.comparator, Some(QuantityComparator::LessOrEqual));
        assert_eq!(quantity.value.to_string(), "0.5");

        assert_eq!(
            observation_value(">>", "mg/L"),
            (None, Some(">>".to_string()))
        );
    }

    #[test]
    fn unit_without_quantity_is_kept_as_a_note() {
        let result = ir::LabResult {
            value: "positive".into(),
            unit: "mmol/L".into(),
            notes: vec!["Repeat advised".into()],
            ..Default::default()
        };
        let (_, string) = observation_value(&result.value, &result.unit);
        let notes = observation_notes(&result, string.as_deref());
        assert_eq!(
            notes,
            vec![
                Annotation {
                    text: "Repeat advised".into()
                },
                Annotation {
                    text: "Unit: mmol/L".into()
                },
            ]
        );

        let numeric = ir::LabResult {
            value: "4.10".into(),
            unit: "mmol/L".into(),
            ..Default::default()
        };
        let (_, string) = observation_value(&numeric.value, &numeric.unit);
        assert!(observation_notes(&numeric, string.as_deref()).is_empty());
    }
}
